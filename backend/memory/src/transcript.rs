/// Plain-text transcript export.
///
/// One file per conversation, one `User: ...` / `Bot: ...` line per message.
/// Files are write-only: nothing reads them back on restart.
use std::path::{Path, PathBuf};

use concierge_core::{ConciergeError, ConversationKey, Message};
use tokio::fs;
use tracing::debug;

pub struct TranscriptWriter {
    pub output_dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, key: &ConversationKey) -> PathBuf {
        self.output_dir.join(format!("{}.txt", key.hash()))
    }

    /// Rewrite the transcript for `key` with `messages`.
    ///
    /// The file is replaced via a temp file and rename, so a failed write
    /// leaves any previous transcript intact.
    pub async fn write(
        &self,
        key: &ConversationKey,
        messages: &[Message],
    ) -> Result<PathBuf, ConciergeError> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| persistence_error(&self.output_dir, e))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, render(messages))
            .await
            .map_err(|e| persistence_error(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| persistence_error(&path, e))?;

        debug!(key = %key, path = %path.display(), "Transcript written");
        Ok(path)
    }
}

pub fn render(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}\n", m.transcript_line()))
        .collect()
}

fn persistence_error(path: &Path, err: std::io::Error) -> ConciergeError {
    ConciergeError::Persistence(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_one_line_per_message() {
        let rendered = render(&[
            Message::user("I'd like a BlueWave Gaming Laptop"),
            Message::assistant("Great choice!\nIt has an RTX GPU."),
        ]);
        assert_eq!(
            rendered,
            "User: I'd like a BlueWave Gaming Laptop\nBot: Great choice!\\nIt has an RTX GPU.\n"
        );
        assert_eq!(render(&[]), "");
    }

    #[tokio::test]
    async fn test_write_overwrites_previous_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path().join("transcripts"));
        let key = ConversationKey::new("alice", "c1");

        writer.write(&key, &[Message::user("first")]).await.unwrap();
        let path = writer
            .write(&key, &[Message::user("first"), Message::assistant("second")])
            .await
            .unwrap();

        assert_eq!(path, writer.path_for(&key));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "User: first\nBot: second\n"
        );
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let writer = TranscriptWriter::new(&blocker);
        let err = writer
            .write(&ConversationKey::new("a", "b"), &[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::Persistence(_)));
    }
}
