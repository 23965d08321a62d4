use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rusqlite::{Connection, params};
use tokio::sync::Mutex;
use tracing::info;

use super::llm::ChatMessage;

/// One stored chat turn as read back for history.
#[derive(Debug, Clone)]
pub struct StoredTurn {
    pub user_message: Option<String>,
    pub agent_response: Option<String>,
}

/// Append-only conversation history, one row per chat turn.
///
/// `message_order` is computed as count-of-existing-messages + 1 with no
/// transaction around the read and the insert. Concurrent turns on the same
/// conversation can race; this mirrors the documented storage contract and
/// is deliberately not strengthened here.
pub struct ConversationStore {
    db: Arc<Mutex<Connection>>,
}

impl ConversationStore {
    pub fn open<P: AsRef<Path>>(workspace_dir: P) -> Result<Self> {
        let workspace_dir = workspace_dir.as_ref();
        if !workspace_dir.exists() {
            std::fs::create_dir_all(workspace_dir)?;
        }

        let db_path = workspace_dir.join("conversations.db");
        let db = Connection::open(&db_path)?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS agent_chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_email TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                user_message TEXT,
                agent_response TEXT,
                message_order INTEGER NOT NULL,
                is_initial_message INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_conversation
             ON agent_chat_messages (user_email, conversation_id)",
            [],
        )?;

        info!("Conversation store ready at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub async fn message_count(&self, user_email: &str, conversation_id: &str) -> Result<i64> {
        let db = self.db.lock().await;
        let count = db.query_row(
            "SELECT COUNT(*) FROM agent_chat_messages
             WHERE user_email = ?1 AND conversation_id = ?2",
            params![user_email, conversation_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Stored turns for one conversation, oldest first.
    pub async fn thread(&self, user_email: &str, conversation_id: &str) -> Result<Vec<StoredTurn>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT user_message, agent_response FROM agent_chat_messages
             WHERE user_email = ?1 AND conversation_id = ?2
             ORDER BY message_order ASC",
        )?;
        let rows = stmt.query_map(params![user_email, conversation_id], |row| {
            Ok(StoredTurn {
                user_message: row.get(0)?,
                agent_response: row.get(1)?,
            })
        })?;

        let mut turns = Vec::new();
        for row in rows {
            turns.push(row?);
        }
        Ok(turns)
    }

    pub async fn append_message(
        &self,
        user_email: &str,
        user_message: &str,
        agent_response: &str,
        conversation_id: &str,
        message_order: i64,
        is_initial_message: bool,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agent_chat_messages
             (user_email, conversation_id, user_message, agent_response, message_order, is_initial_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_email,
                conversation_id,
                user_message,
                agent_response,
                message_order,
                is_initial_message
            ],
        )?;
        Ok(())
    }

    /// Store one (user message, agent response) pair at the next order index.
    /// Returns the order assigned to the turn.
    pub async fn record_turn(
        &self,
        user_email: &str,
        user_message: &str,
        agent_response: &str,
        conversation_id: &str,
    ) -> Result<i64> {
        let message_order = self.message_count(user_email, conversation_id).await? + 1;
        self.append_message(
            user_email,
            user_message,
            agent_response,
            conversation_id,
            message_order,
            message_order == 1,
        )
        .await?;
        Ok(message_order)
    }
}

/// Flatten stored turns into the role/content list the AI context expects.
pub fn to_history(turns: &[StoredTurn]) -> Vec<ChatMessage> {
    let mut history = Vec::new();
    for turn in turns {
        if let Some(user) = &turn.user_message {
            history.push(ChatMessage::user(user.clone()));
        }
        if let Some(agent) = &turn.agent_response {
            history.push(ChatMessage::assistant(agent.clone()));
        }
    }
    history
}
