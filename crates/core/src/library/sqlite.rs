//! SQLite-backed library (albums + snatch history).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    AlbumFilter, AlbumRecord, AlbumStatus, AlbumStore, HistoryStore, LibraryError, SnatchRecord,
    SnatchStatus,
};
use crate::searcher::CandidateKind;

/// SQLite-backed album and history store.
pub struct SqliteLibrary {
    conn: Mutex<Connection>,
}

impl SqliteLibrary {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, LibraryError> {
        let conn = Connection::open(path).map_err(|e| LibraryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory library (useful for testing).
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| LibraryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LibraryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS albums (
                album_id TEXT PRIMARY KEY,
                artist_name TEXT NOT NULL,
                album_title TEXT NOT NULL,
                release_date TEXT,
                album_type TEXT,
                duration_ms INTEGER,
                search_term TEXT,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS snatched (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                album_id TEXT NOT NULL,
                title TEXT NOT NULL,
                size INTEGER NOT NULL,
                url TEXT NOT NULL,
                date_added TEXT NOT NULL,
                status TEXT NOT NULL,
                folder_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                torrent_hash TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_albums_status ON albums(status);
            CREATE INDEX IF NOT EXISTS idx_snatched_url ON snatched(url);
            CREATE INDEX IF NOT EXISTS idx_snatched_album ON snatched(album_id);
            "#,
        )
        .map_err(|e| LibraryError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LibraryError> {
        self.conn
            .lock()
            .map_err(|_| LibraryError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<AlbumRecord> {
        let status: String = row.get(7)?;
        let duration: Option<i64> = row.get(5)?;

        Ok(AlbumRecord {
            album_id: row.get(0)?,
            artist_name: row.get(1)?,
            album_title: row.get(2)?,
            release_date: row.get(3)?,
            album_type: row.get(4)?,
            duration_ms: duration.map(|d| d.max(0) as u64),
            search_term: row.get(6)?,
            // Unknown statuses are treated as not wanted.
            status: AlbumStatus::parse(&status).unwrap_or(AlbumStatus::Skipped),
        })
    }

    fn row_to_snatch(row: &rusqlite::Row) -> rusqlite::Result<SnatchRecord> {
        let size: i64 = row.get(2)?;
        let date_added: String = row.get(4)?;
        let status: String = row.get(5)?;
        let kind: String = row.get(7)?;

        let snatched_at = DateTime::parse_from_rfc3339(&date_added)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(SnatchRecord {
            album_id: row.get(0)?,
            title: row.get(1)?,
            size: size.max(0) as u64,
            locator: row.get(3)?,
            snatched_at,
            status: SnatchStatus::parse(&status).unwrap_or(SnatchStatus::Snatched),
            folder_name: row.get(6)?,
            kind: CandidateKind::parse(&kind).unwrap_or(CandidateKind::Torrent),
            torrent_id: row.get(8)?,
        })
    }
}

impl AlbumStore for SqliteLibrary {
    fn upsert_album(&self, album: &AlbumRecord) -> Result<(), LibraryError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO albums (album_id, artist_name, album_title, release_date, album_type, duration_ms, search_term, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(album_id) DO UPDATE SET
                artist_name = excluded.artist_name,
                album_title = excluded.album_title,
                release_date = excluded.release_date,
                album_type = excluded.album_type,
                duration_ms = excluded.duration_ms,
                search_term = excluded.search_term,
                status = excluded.status,
                updated_at = excluded.updated_at",
            params![
                album.album_id,
                album.artist_name,
                album.album_title,
                album.release_date,
                album.album_type,
                album.duration_ms.map(|d| d as i64),
                album.search_term,
                album.status.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_album(&self, album_id: &str) -> Result<Option<AlbumRecord>, LibraryError> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT album_id, artist_name, album_title, release_date, album_type, duration_ms, search_term, status FROM albums WHERE album_id = ?",
            params![album_id],
            Self::row_to_album,
        );

        match result {
            Ok(album) => Ok(Some(album)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LibraryError::Database(e.to_string())),
        }
    }

    fn list_albums(&self, filter: &AlbumFilter) -> Result<Vec<AlbumRecord>, LibraryError> {
        let conn = self.lock()?;

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let where_clause = if filter.statuses.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; filter.statuses.len()].join(", ");
            for status in &filter.statuses {
                params.push(Box::new(status.as_str()));
            }
            format!("WHERE status IN ({})", placeholders)
        };
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let sql = format!(
            "SELECT album_id, artist_name, album_title, release_date, album_type, duration_ms, search_term, status FROM albums {} ORDER BY release_date DESC, album_id ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_album)
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| LibraryError::Database(e.to_string()))
    }
}

impl HistoryStore for SqliteLibrary {
    fn insert_snatch(&self, record: &SnatchRecord) -> Result<(), LibraryError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO snatched (album_id, title, size, url, date_added, status, folder_name, kind, torrent_hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.album_id,
                record.title,
                record.size as i64,
                record.locator,
                record.snatched_at.to_rfc3339(),
                record.status.as_str(),
                record.folder_name,
                record.kind.as_str(),
                record.torrent_id,
            ],
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| LibraryError::Database(e.to_string()))
    }

    fn has_locator(&self, locator: &str) -> Result<bool, LibraryError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM snatched WHERE url = ?)",
            params![locator],
            |row| row.get::<_, bool>(0),
        )
        .map_err(|e| LibraryError::Database(e.to_string()))
    }

    fn update_album_status(
        &self,
        album_id: &str,
        status: AlbumStatus,
    ) -> Result<(), LibraryError> {
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE albums SET status = ?, updated_at = ? WHERE album_id = ?",
                params![status.as_str(), Utc::now().to_rfc3339(), album_id],
            )
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(LibraryError::NotFound(album_id.to_string()));
        }
        Ok(())
    }

    fn list_snatches(
        &self,
        album_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SnatchRecord>, LibraryError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT album_id, title, size, url, date_added, status, folder_name, kind, torrent_hash FROM snatched
                 WHERE (?1 IS NULL OR album_id = ?1)
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![album_id, limit], Self::row_to_snatch)
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| LibraryError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn album(id: &str, status: AlbumStatus) -> AlbumRecord {
        AlbumRecord {
            album_id: id.to_string(),
            artist_name: "Slowdive".to_string(),
            album_title: format!("Souvlaki {}", id),
            release_date: Some("1993-05-17".to_string()),
            album_type: Some("Album".to_string()),
            duration_ms: Some(2_400_000),
            search_term: None,
            status,
        }
    }

    fn snatch(album_id: &str, locator: &str) -> SnatchRecord {
        SnatchRecord {
            album_id: album_id.to_string(),
            title: "Slowdive - Souvlaki [FLAC]".to_string(),
            size: 350_000_000,
            locator: locator.to_string(),
            snatched_at: Utc::now(),
            status: SnatchStatus::SeedSnatched,
            folder_name: "Slowdive - Souvlaki".to_string(),
            kind: CandidateKind::Torrent,
            torrent_id: Some("abcdef".to_string()),
        }
    }

    #[test]
    fn test_upsert_and_get_album() {
        let lib = SqliteLibrary::in_memory().unwrap();
        lib.upsert_album(&album("a1", AlbumStatus::Wanted)).unwrap();

        let fetched = lib.get_album("a1").unwrap().unwrap();
        assert_eq!(fetched, album("a1", AlbumStatus::Wanted));

        let mut changed = album("a1", AlbumStatus::Skipped);
        changed.search_term = Some("slowdive souvlaki".to_string());
        lib.upsert_album(&changed).unwrap();
        assert_eq!(lib.get_album("a1").unwrap().unwrap(), changed);

        assert!(lib.get_album("missing").unwrap().is_none());
    }

    #[test]
    fn test_wanted_albums_filters_by_status() {
        let lib = SqliteLibrary::in_memory().unwrap();
        lib.upsert_album(&album("a1", AlbumStatus::Wanted)).unwrap();
        lib.upsert_album(&album("a2", AlbumStatus::WantedLossless))
            .unwrap();
        lib.upsert_album(&album("a3", AlbumStatus::Snatched)).unwrap();
        lib.upsert_album(&album("a4", AlbumStatus::Skipped)).unwrap();

        let mut ids: Vec<_> = lib
            .wanted_albums()
            .unwrap()
            .into_iter()
            .map(|a| a.album_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a1", "a2"]);

        let all = lib.list_albums(&AlbumFilter::new()).unwrap();
        assert_eq!(all.len(), 4);

        let page = lib
            .list_albums(&AlbumFilter::new().with_limit(2).with_offset(3))
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_snatch_history() {
        let lib = SqliteLibrary::in_memory().unwrap();
        lib.upsert_album(&album("a1", AlbumStatus::Wanted)).unwrap();

        assert!(!lib.has_locator("magnet:?xt=urn:btih:abc").unwrap());
        lib.insert_snatch(&snatch("a1", "magnet:?xt=urn:btih:abc"))
            .unwrap();
        assert!(lib.has_locator("magnet:?xt=urn:btih:abc").unwrap());
        assert!(!lib.has_locator("magnet:?xt=urn:btih:ABC").unwrap());

        lib.insert_snatch(&snatch("a2", "http://x/2.torrent")).unwrap();

        let all = lib.list_snatches(None, 10).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].locator, "http://x/2.torrent");

        let only_a1 = lib.list_snatches(Some("a1"), 10).unwrap();
        assert_eq!(only_a1.len(), 1);
        assert_eq!(only_a1[0].status, SnatchStatus::SeedSnatched);
        assert_eq!(only_a1[0].torrent_id.as_deref(), Some("abcdef"));
        assert_eq!(only_a1[0].kind, CandidateKind::Torrent);
    }

    #[test]
    fn test_update_album_status() {
        let lib = SqliteLibrary::in_memory().unwrap();
        lib.upsert_album(&album("a1", AlbumStatus::Wanted)).unwrap();

        lib.update_album_status("a1", AlbumStatus::Snatched).unwrap();
        assert_eq!(
            lib.get_album("a1").unwrap().unwrap().status,
            AlbumStatus::Snatched
        );

        let err = lib
            .update_album_status("nope", AlbumStatus::Snatched)
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
    }

    #[test]
    fn test_file_backed_library_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.db");

        {
            let lib = SqliteLibrary::new(&path).unwrap();
            lib.upsert_album(&album("a1", AlbumStatus::Wanted)).unwrap();
            lib.insert_snatch(&snatch("a1", "http://x/1.nzb")).unwrap();
        }

        let lib = SqliteLibrary::new(&path).unwrap();
        assert!(lib.get_album("a1").unwrap().is_some());
        assert!(lib.has_locator("http://x/1.nzb").unwrap());
    }
}
