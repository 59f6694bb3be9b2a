// himalaya-cache, a Rust library for email folder caching.
// Copyright (C) 2022  soywod <clement.douin@posteo.net>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! SQLite store module.
//!
//! This module contains the SQLite implementation of the persisted
//! folder cache store. Records are serialized as JSON blobs, indexed
//! by account, folder and token.

use log::{debug, trace};
use rusqlite::{params, Connection};
use std::{fs, path::Path};

use crate::{CacheConfig, CachedMessage, FolderId, Token};

use super::{CommitBatch, Error, FolderCacheStore, Result};

pub const DEFAULT_DB_FILE_NAME: &str = "folder-cache.sqlite";

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS folders (
        account TEXT NOT NULL,
        id      TEXT NOT NULL,
        path    TEXT NOT NULL,
        delim   TEXT NOT NULL,
        UNIQUE(account, id, path)
    );
    CREATE TABLE IF NOT EXISTS messages (
        account     TEXT    NOT NULL,
        folder_id   TEXT    NOT NULL,
        folder_path TEXT    NOT NULL,
        token       INTEGER NOT NULL,
        record      BLOB    NOT NULL,
        UNIQUE(account, folder_id, folder_path, token)
    );
";

const SELECT_FOLDERS: &str = "
    SELECT id, path, delim
    FROM folders
    WHERE account = ?
    ORDER BY path
";

const INSERT_FOLDER: &str = "
    INSERT OR REPLACE INTO folders
    VALUES (?, ?, ?, ?)
";

const DELETE_FOLDER: &str = "
    DELETE FROM folders
    WHERE account = ?
    AND id = ?
    AND path = ?
";

const SELECT_MESSAGES: &str = "
    SELECT token, record
    FROM messages
    WHERE account = ?
    AND folder_id = ?
    AND folder_path = ?
    ORDER BY token
";

const INSERT_MESSAGE: &str = "
    INSERT INTO messages
    VALUES (?, ?, ?, ?, ?)
";

const DELETE_MESSAGES: &str = "
    DELETE FROM messages
    WHERE account = ?
    AND folder_id = ?
    AND folder_path = ?
";

const DELETE_ACCOUNT_FOLDERS: &str = "DELETE FROM folders WHERE account = ?";
const DELETE_ACCOUNT_MESSAGES: &str = "DELETE FROM messages WHERE account = ?";

/// The SQLite persisted store.
///
/// One database can hold the record sets of several accounts, each
/// store instance only sees the rows of its own account.
pub struct SqliteStore {
    account: String,
    conn: Connection,
}

impl SqliteStore {
    fn init(account: String, conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self { account, conn })
    }

    /// Opens (or creates) the database at the given path.
    pub fn open<A, P>(account: A, path: P) -> Result<Self>
    where
        A: ToString,
        P: AsRef<Path>,
    {
        debug!("opening folder cache database at {:?}", path.as_ref());
        Self::init(account.to_string(), Connection::open(path)?)
    }

    /// Opens a private, non durable database.
    pub fn open_in_memory<A: ToString>(account: A) -> Result<Self> {
        Self::init(account.to_string(), Connection::open_in_memory()?)
    }

    /// Opens the database located in the sync directory of the given
    /// config, creating the directory if needed.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let sync_dir = config.sync_dir()?;
        fs::create_dir_all(&sync_dir)
            .map_err(|err| Error::CreateSyncDirError(err, sync_dir.clone()))?;
        Self::open(&config.name, sync_dir.join(DEFAULT_DB_FILE_NAME))
    }
}

impl FolderCacheStore for SqliteStore {
    fn load_folders(&mut self) -> Result<Vec<FolderId>> {
        let mut stmt = self.conn.prepare(SELECT_FOLDERS)?;
        let folders = stmt
            .query_map([self.account.as_str()], |row| {
                Ok(FolderId {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    delim: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        trace!("loaded folders: {:#?}", folders);

        Ok(folders)
    }

    fn load_messages(&mut self, folder: &FolderId) -> Result<Vec<CachedMessage>> {
        let mut stmt = self.conn.prepare(SELECT_MESSAGES)?;
        let rows = stmt
            .query_map(
                [self.account.as_str(), folder.id.as_str(), folder.path.as_str()],
                |row| Ok((Token(row.get::<usize, i64>(0)? as u64), row.get::<usize, Vec<u8>>(1)?)),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut messages = Vec::with_capacity(rows.len());

        for (token, blob) in rows {
            let message: CachedMessage = serde_json::from_slice(&blob)
                .map_err(|err| Error::DeserializeMessageError(err, folder.clone(), token))?;
            if message.token != token {
                return Err(Error::MismatchTokenError(
                    folder.clone(),
                    message.token,
                    token,
                ));
            }
            messages.push(message);
        }

        debug!("loaded {} messages from folder {folder}", messages.len());

        Ok(messages)
    }

    fn commit(&mut self, batch: CommitBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        debug!(
            "committing {} folder(s), removing {} folder(s)",
            batch.upserts.len(),
            batch.removals.len()
        );

        let account = self.account.as_str();
        let tx = self.conn.transaction()?;

        for folder in &batch.removals {
            tx.execute(DELETE_MESSAGES, params![account, folder.id, folder.path])?;
            tx.execute(DELETE_FOLDER, params![account, folder.id, folder.path])?;
        }

        for (folder, messages) in &batch.upserts {
            tx.execute(DELETE_MESSAGES, params![account, folder.id, folder.path])?;
            tx.execute(
                INSERT_FOLDER,
                params![account, folder.id, folder.path, folder.delim],
            )?;

            let mut stmt = tx.prepare(INSERT_MESSAGE)?;
            for message in messages {
                let blob = serde_json::to_vec(message).map_err(|err| {
                    Error::SerializeMessageError(err, folder.clone(), message.token)
                })?;
                stmt.execute(params![
                    account,
                    folder.id,
                    folder.path,
                    message.token.as_u64() as i64,
                    blob,
                ])?;
            }
        }

        // dropping the transaction on error rolls it back
        tx.commit()?;

        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        debug!("destroying folder cache of account {}", self.account);

        let tx = self.conn.transaction()?;
        tx.execute(DELETE_ACCOUNT_MESSAGES, [self.account.as_str()])?;
        tx.execute(DELETE_ACCOUNT_FOLDERS, [self.account.as_str()])?;
        tx.commit()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use crate::{
        store::{CommitBatch, FolderCacheStore},
        CachedMessage, Envelope, Flag, Flags, FolderId, Mailbox, MessageStructure,
    };

    use super::SqliteStore;

    fn inbox() -> FolderId {
        FolderId::new("account:INBOX", "INBOX")
    }

    fn message(token: u64) -> CachedMessage {
        CachedMessage::new(token, token as u32)
            .with_flags(Flags::from_iter([Flag::Seen]))
            .with_envelope(Envelope::new(
                format!("<{token}@localhost>"),
                Mailbox::new_nameless("alice@localhost"),
                format!("subject {token}"),
            ))
            .with_structure(MessageStructure::new("text/plain", 42))
    }

    #[test]
    fn commit_then_load() {
        let mut store = SqliteStore::open_in_memory("account").unwrap();

        store
            .commit(CommitBatch {
                upserts: vec![(inbox(), vec![message(1), message(2)])],
                removals: vec![],
            })
            .unwrap();

        assert_eq!(vec![inbox()], store.load_folders().unwrap());
        assert_eq!(
            vec![message(1), message(2)],
            store.load_messages(&inbox()).unwrap()
        );

        // an upsert replaces the whole folder
        store
            .commit(CommitBatch {
                upserts: vec![(inbox(), vec![message(2)])],
                removals: vec![],
            })
            .unwrap();
        assert_eq!(vec![message(2)], store.load_messages(&inbox()).unwrap());

        store
            .commit(CommitBatch {
                upserts: vec![],
                removals: vec![inbox()],
            })
            .unwrap();
        assert!(store.load_folders().unwrap().is_empty());
        assert!(store.load_messages(&inbox()).unwrap().is_empty());
    }

    #[test]
    fn accounts_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");

        let mut alice = SqliteStore::open("alice", &path).unwrap();
        alice
            .commit(CommitBatch {
                upserts: vec![(inbox(), vec![message(1)])],
                removals: vec![],
            })
            .unwrap();

        let mut bob = SqliteStore::open("bob", &path).unwrap();
        assert!(bob.load_folders().unwrap().is_empty());

        bob.destroy().unwrap();
        assert_eq!(vec![inbox()], alice.load_folders().unwrap());
    }

    #[test]
    fn corrupted_folder_loads_as_empty() {
        let mut store = SqliteStore::open_in_memory("account").unwrap();
        let archives = FolderId::new("account:Archives", "Archives");

        store
            .commit(CommitBatch {
                upserts: vec![
                    (inbox(), vec![message(1)]),
                    (archives.clone(), vec![message(1)]),
                ],
                removals: vec![],
            })
            .unwrap();

        store
            .conn
            .execute(
                "UPDATE messages SET record = ? WHERE folder_id = ?",
                params![b"{not json".to_vec(), archives.id],
            )
            .unwrap();

        assert!(store.load_messages(&archives).is_err());

        let snapshot = store.load().unwrap();
        assert_eq!(Some(&vec![message(1)]), snapshot.get(&inbox()));
        assert_eq!(Some(&vec![]), snapshot.get(&archives));
    }
}
