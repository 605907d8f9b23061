use crate::domain::user::User;

/// Filters applied to the directory before a new chat is started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUsersQuery {
    /// Usually the signed-in user, who cannot start a chat with themselves.
    pub exclude_user_id: Option<i64>,
    /// Case-insensitive match against name or email.
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsersSourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
}

pub trait UsersSource {
    fn list_users(&self) -> Result<Vec<User>, UsersSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListUsersError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

pub fn list_users(
    source: &dyn UsersSource,
    query: ListUsersQuery,
) -> Result<Vec<User>, ListUsersError> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|needle| !needle.is_empty())
        .map(str::to_lowercase);

    let users = source
        .list_users()
        .map_err(map_source_error)?
        .into_iter()
        .filter(|user| Some(user.id) != query.exclude_user_id)
        .filter(|user| match &needle {
            Some(needle) => {
                user.name.to_lowercase().contains(needle)
                    || user.email.to_lowercase().contains(needle)
            }
            None => true,
        })
        .collect();

    Ok(users)
}

fn map_source_error(error: UsersSourceError) -> ListUsersError {
    match error {
        UsersSourceError::Unauthorized => ListUsersError::Unauthorized,
        UsersSourceError::Unavailable => ListUsersError::TemporarilyUnavailable,
        UsersSourceError::InvalidData => ListUsersError::DataContractViolation,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    struct StubSource {
        result: Result<Vec<User>, UsersSourceError>,
    }

    impl UsersSource for StubSource {
        fn list_users(&self) -> Result<Vec<User>, UsersSourceError> {
            self.result.clone()
        }
    }

    fn user(id: i64, name: &str, email: &str) -> User {
        User {
            id,
            name: name.to_owned(),
            email: email.to_owned(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn directory() -> StubSource {
        StubSource {
            result: Ok(vec![
                user(1, "Ana", "ana@example.com"),
                user(2, "Bruno", "bruno@example.com"),
                user(3, "Carla", "carla@work.io"),
            ]),
        }
    }

    #[test]
    fn excludes_the_requesting_user() {
        let users = list_users(
            &directory(),
            ListUsersQuery {
                exclude_user_id: Some(1),
                search: None,
            },
        )
        .expect("list should succeed");

        let ids: Vec<i64> = users.iter().map(|user| user.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn search_matches_name_or_email_case_insensitively() {
        let by_name = list_users(
            &directory(),
            ListUsersQuery {
                exclude_user_id: None,
                search: Some("BRU".to_owned()),
            },
        )
        .expect("list should succeed");
        let by_email = list_users(
            &directory(),
            ListUsersQuery {
                exclude_user_id: None,
                search: Some("work.io".to_owned()),
            },
        )
        .expect("list should succeed");

        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, 2);
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].id, 3);
    }

    #[test]
    fn blank_search_keeps_everyone() {
        let users = list_users(
            &directory(),
            ListUsersQuery {
                exclude_user_id: None,
                search: Some("   ".to_owned()),
            },
        )
        .expect("list should succeed");

        assert_eq!(users.len(), 3);
    }

    #[test]
    fn maps_unauthorized_error() {
        let source = StubSource {
            result: Err(UsersSourceError::Unauthorized),
        };

        let err = list_users(&source, ListUsersQuery::default()).expect_err("must fail");

        assert_eq!(err, ListUsersError::Unauthorized);
    }
}
