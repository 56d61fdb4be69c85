//! Local user accounts

use crate::db::collect_rows;
use crate::types::{new_id, now_millis};
use crate::{Database, Error, Result};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
    pub created_at: i64,
}

const USER_COLUMNS: &str = "id, email, display_name, roles, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let roles: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        roles: serde_json::from_str(&roles).unwrap_or_default(),
        created_at: row.get(4)?,
    })
}

/// Hex SHA-256 of `salt || password`
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            user_from_row,
        )
        .optional()?)
}

impl Database {
    pub fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
        roles: Vec<String>,
    ) -> Result<User> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::validation("a valid email is required"));
        }
        if password.len() < 8 {
            return Err(Error::validation("password must be at least 8 characters"));
        }

        let salt = generate_salt();
        let user = User {
            id: new_id(),
            display_name: if display_name.trim().is_empty() {
                email.clone()
            } else {
                display_name.trim().to_string()
            },
            email,
            roles,
            created_at: now_millis(),
        };

        self.transaction(|tx| {
            if find_by_email(tx, &user.email)?.is_some() {
                return Err(Error::AlreadyExists {
                    kind: "user".to_string(),
                    id: user.email.clone(),
                });
            }
            tx.execute(
                "INSERT INTO users (id, email, display_name, roles, password_salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.email,
                    user.display_name,
                    serde_json::to_string(&user.roles)?,
                    salt,
                    hash_password(&salt, password),
                    user.created_at,
                ],
            )?;
            Ok(())
        })?;

        info!("Created user {}", user.email);
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|conn| find_by_email(conn, &email.trim().to_lowercase()))
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("user", id))
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at ASC",
                USER_COLUMNS
            ))?;
            let rows = stmt.query_map([], user_from_row)?;
            collect_rows(rows)
        })
    }

    /// The user if `password` matches, otherwise `None`.
    pub fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        self.read(|conn| {
            let stored: Option<(String, String)> = conn
                .query_row(
                    "SELECT password_salt, password_hash FROM users WHERE email = ?1",
                    params![email],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match stored {
                Some((salt, hash)) if hash_password(&salt, password) == hash => {
                    find_by_email(conn, &email)
                }
                _ => Ok(None),
            }
        })
    }

    /// Create the bootstrap admin account unless it already exists.
    pub fn ensure_admin(&self, email: &str, password: &str) -> Result<User> {
        if let Some(user) = self.get_user_by_email(email)? {
            return Ok(user);
        }
        self.create_user(email, "Administrator", password, vec!["admin".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let db = Database::open_memory().unwrap();
        let user = db
            .create_user("Dev@Example.com", "Dev", "correct horse", vec!["editor".to_string()])
            .unwrap();
        assert_eq!(user.email, "dev@example.com");

        let found = db.verify_password("dev@example.com", "correct horse").unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(db.verify_password("dev@example.com", "wrong").unwrap().is_none());
        assert!(db.verify_password("nobody@example.com", "correct horse").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_rejected() {
        let db = Database::open_memory().unwrap();
        db.create_user("a@example.com", "", "password1", vec![]).unwrap();
        let err = db.create_user("A@example.com", "", "password2", vec![]).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn test_ensure_admin_is_idempotent() {
        let db = Database::open_memory().unwrap();
        let first = db.ensure_admin("admin@example.com", "changeme123").unwrap();
        let second = db.ensure_admin("admin@example.com", "changeme123").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.roles, vec!["admin"]);
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_salts_differ_per_user() {
        assert_ne!(generate_salt(), generate_salt());
        assert_ne!(hash_password("a", "pw"), hash_password("b", "pw"));
    }
}
