use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use palaver::models::conversation::Conversation;

pub fn ensure_session_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home_dir.join(".config").join("palaver").join("sessions");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Resolve a session argument: anything that looks like a path is used as is, a bare name
/// lives in the session directory
pub fn session_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.components().count() > 1 || path.extension().is_some() {
        return Ok(path.to_path_buf());
    }
    Ok(ensure_session_dir()?.join(format!("{}.json", name)))
}

/// Read a saved conversation, starting a fresh one when the file does not exist yet
pub fn load_conversation(session_file: &Path) -> Result<Conversation> {
    match fs::read_to_string(session_file) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
            anyhow::anyhow!(
                "Failed to parse session file {}: {}",
                session_file.display(),
                e
            )
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Conversation::new()),
        Err(e) => Err(anyhow::anyhow!("Failed to open session file: {}", e)),
    }
}

pub fn persist_conversation(session_file: &Path, conversation: &Conversation) -> Result<()> {
    if let Some(parent) = session_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(session_file, serde_json::to_string_pretty(conversation)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver::models::message::Message;
    use tempfile::tempdir;

    #[test]
    fn test_missing_session_starts_fresh() {
        let dir = tempdir().unwrap();
        let conversation = load_conversation(&dir.path().join("nope.json")).unwrap();
        assert!(conversation.is_empty());
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nested").join("chat.json");
        let conversation = Conversation::new()
            .with_message(Message::user().with_text("Hello"))
            .with_message(Message::assistant().with_text("Hi there"));

        persist_conversation(&file, &conversation).unwrap();
        let loaded = load_conversation(&file).unwrap();

        assert_eq!(loaded, conversation);
        assert_eq!(loaded.thread_id(), conversation.thread_id());
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "not json").unwrap();
        assert!(load_conversation(&file).is_err());
    }

    #[test]
    fn test_session_path_keeps_explicit_paths() {
        assert_eq!(
            session_path("chats/today.json").unwrap(),
            PathBuf::from("chats/today.json")
        );
        assert_eq!(session_path("today.json").unwrap(), PathBuf::from("today.json"));
    }
}
