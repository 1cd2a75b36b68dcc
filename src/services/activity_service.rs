use crate::db::now_timestamp;
use crate::models::{ActivityType, ActivityView, NewActivity};
use crate::repositories::{ActivityRepository, RepositoryError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ActivityServiceError {
    #[error("Please write something before submitting.")]
    EmptyAnswer,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Who is looking at activity data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub phone: String,
    pub is_admin: bool,
}

pub struct ActivityService {
    repository: Arc<dyn ActivityRepository>,
}

impl ActivityService {
    pub fn new(repository: Arc<dyn ActivityRepository>) -> Self {
        Self { repository }
    }

    pub async fn record(&self, activity: NewActivity) -> Result<i64, ActivityServiceError> {
        let id = self.repository.insert(&activity, &now_timestamp()).await?;
        tracing::info!(
            "Saved {} activity #{} for {}",
            activity.activity_type,
            id,
            activity.phone
        );
        Ok(id)
    }

    pub async fn record_truth_answer(
        &self,
        phone: &str,
        prompt: &str,
        answer: &str,
    ) -> Result<i64, ActivityServiceError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ActivityServiceError::EmptyAnswer);
        }

        self.record(NewActivity {
            phone: phone.to_string(),
            activity_type: ActivityType::Truth,
            prompt: Some(prompt.to_string()),
            response_text: Some(answer.to_string()),
            file_name: None,
        })
        .await
    }

    /// Admins see everyone's activity, users only their own. Newest first.
    pub async fn list_for(&self, viewer: &Viewer) -> Result<Vec<ActivityView>, ActivityServiceError> {
        let scope = if viewer.is_admin {
            None
        } else {
            Some(viewer.phone.clone())
        };
        Ok(self.repository.list(scope).await?)
    }

    /// A stored upload is visible to the user who made it and to admins.
    pub async fn can_view_file(
        &self,
        viewer: &Viewer,
        file_name: &str,
    ) -> Result<bool, ActivityServiceError> {
        let owner = self.repository.find_by_file_name(file_name).await?;
        Ok(match owner {
            Some(activity) => viewer.is_admin || activity.phone == viewer.phone,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Activity;
    use crate::repositories::activity_repository::MockActivityRepository;
    use mockall::predicate::*;

    fn viewer(phone: &str, is_admin: bool) -> Viewer {
        Viewer {
            phone: phone.to_string(),
            is_admin,
        }
    }

    #[tokio::test]
    async fn test_blank_truth_answer_is_rejected() {
        let service = ActivityService::new(Arc::new(MockActivityRepository::new()));
        let result = service
            .record_truth_answer("+15550001111", "Describe a moment.", "   \n ")
            .await;
        assert!(matches!(result, Err(ActivityServiceError::EmptyAnswer)));
    }

    #[tokio::test]
    async fn test_truth_answer_is_trimmed() {
        let mut mock_repo = MockActivityRepository::new();
        mock_repo
            .expect_insert()
            .withf(|a, _| {
                a.activity_type == ActivityType::Truth
                    && a.response_text.as_deref() == Some("I sang in the shower")
            })
            .times(1)
            .returning(|_, _| Ok(7));

        let service = ActivityService::new(Arc::new(mock_repo));
        let id = service
            .record_truth_answer("+15550001111", "When did you last sing?", "  I sang in the shower ")
            .await
            .unwrap();
        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn test_users_only_list_their_own_activity() {
        let mut mock_repo = MockActivityRepository::new();
        mock_repo
            .expect_list()
            .with(eq(Some("+15550001111".to_string())))
            .times(1)
            .returning(|_| Ok(vec![]));
        mock_repo
            .expect_list()
            .with(eq(None))
            .times(1)
            .returning(|_| Ok(vec![]));

        let service = ActivityService::new(Arc::new(mock_repo));
        service
            .list_for(&viewer("+15550001111", false))
            .await
            .unwrap();
        service.list_for(&viewer("+15550002222", true)).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_visibility() {
        let mut mock_repo = MockActivityRepository::new();
        mock_repo.expect_find_by_file_name().returning(|name| {
            let found = (name == "abc_cat.png").then(|| Activity {
                id: 1,
                phone: "+15550001111".to_string(),
                activity_type: "Meme".to_string(),
                prompt: Some("Meme upload".to_string()),
                response_text: None,
                file_name: Some("abc_cat.png".to_string()),
                timestamp: "2025-01-01 00:00:00".to_string(),
            });
            Ok(found)
        });

        let service = ActivityService::new(Arc::new(mock_repo));
        let owner = viewer("+15550001111", false);
        let other = viewer("+15550002222", false);
        let admin = viewer("+15550003333", true);

        assert!(service.can_view_file(&owner, "abc_cat.png").await.unwrap());
        assert!(!service.can_view_file(&other, "abc_cat.png").await.unwrap());
        assert!(service.can_view_file(&admin, "abc_cat.png").await.unwrap());
        assert!(!service.can_view_file(&admin, "missing.png").await.unwrap());
    }
}
