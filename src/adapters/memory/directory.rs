use crate::domain::user::{Role, UserId, UserProfile};
use crate::error::Result;
use crate::services::directory::UserDirectory;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;

/// Users and courses loaded into an [`InMemoryDirectory`] at startup.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub courses: Vec<SeedCourse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedUser {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedCourse {
    pub id: i64,
    pub instructor_id: UserId,
    #[serde(default)]
    pub enrolled: Vec<UserId>,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<UserId, UserProfile>,
    course_instructors: DashMap<i64, UserId>,
    enrollments: DashMap<i64, Vec<UserId>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for user in seed.users {
            let email = user.email.unwrap_or_else(|| format!("{}@coursehub.test", user.name.to_lowercase()));
            directory.insert_profile(UserProfile {
                id: user.id,
                name: user.name,
                email,
                avatar_url: user.avatar_url,
                role: user.role,
            });
        }
        for course in seed.courses {
            directory.add_course(course.id, course.instructor_id);
            for user_id in course.enrolled {
                directory.enroll(course.id, user_id);
            }
        }
        directory
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn add_user(&self, id: UserId, name: &str, role: Role) {
        self.insert_profile(UserProfile {
            id,
            name: name.to_string(),
            email: format!("{}@coursehub.test", name.to_lowercase()),
            avatar_url: None,
            role,
        });
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.users.insert(profile.id, profile);
    }

    pub fn add_course(&self, course_id: i64, instructor_id: UserId) {
        self.course_instructors.insert(course_id, instructor_id);
    }

    pub fn enroll(&self, course_id: i64, user_id: UserId) {
        let mut enrolled = self.enrollments.entry(course_id).or_default();
        if !enrolled.contains(&user_id) {
            enrolled.push(user_id);
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        Ok(self.users.get(&user_id).map(|p| p.value().clone()))
    }

    async fn profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>> {
        Ok(user_ids.iter().filter_map(|id| self.users.get(id).map(|p| (*id, p.value().clone()))).collect())
    }

    async fn course_instructor(&self, course_id: i64) -> Result<Option<UserId>> {
        Ok(self.course_instructors.get(&course_id).map(|i| *i.value()))
    }

    async fn course_participants(&self, course_id: i64) -> Result<Vec<UserId>> {
        Ok(self.enrollments.get(&course_id).map(|e| e.value().clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_seed() {
        let seed: DirectorySeed = serde_json::from_str(
            r#"{
                "users": [
                    { "id": 1, "name": "Ada", "role": "student" },
                    { "id": 5, "name": "Grace", "email": "grace@school.test", "avatarUrl": "https://cdn/g.png", "role": "instructor" }
                ],
                "courses": [ { "id": 3, "instructorId": 5, "enrolled": [1, 1] } ]
            }"#,
        )
        .unwrap();
        let directory = InMemoryDirectory::from_seed(seed);

        assert_eq!(directory.user_count(), 2);
        let grace = directory.profile(5).await.unwrap().unwrap();
        assert_eq!(grace.role, Role::Instructor);
        assert_eq!(grace.avatar_url.as_deref(), Some("https://cdn/g.png"));
        assert_eq!(directory.profile(1).await.unwrap().unwrap().email, "ada@coursehub.test");
        assert_eq!(directory.course_instructor(3).await.unwrap(), Some(5));
        assert_eq!(directory.course_participants(3).await.unwrap(), vec![1]);
    }

    #[test]
    fn test_seed_rejects_unknown_role() {
        let parsed = serde_json::from_str::<DirectorySeed>(r#"{ "users": [{ "id": 1, "name": "x", "role": "dean" }] }"#);
        assert!(parsed.is_err());
    }
}
