use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Public channel profile with subscription stats.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub user_name: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

/// Aggregate a channel's public profile in one query.
///
/// `viewer_id` is the authenticated caller, if any; `is_subscribed` is false
/// for anonymous viewers.
pub async fn channel_profile(
    db: &PgPool,
    user_name: &str,
    viewer_id: Option<Uuid>,
) -> anyhow::Result<Option<ChannelProfile>> {
    let profile = sqlx::query_as::<_, ChannelProfile>(
        r#"
        SELECT u.id,
               u.user_name,
               u.full_name,
               u.avatar_url,
               u.cover_image_url,
               (SELECT COUNT(*) FROM subscriptions s
                 WHERE s.channel_id = u.id) AS subscribers_count,
               (SELECT COUNT(*) FROM subscriptions s
                 WHERE s.subscriber_id = u.id) AS channels_subscribed_to_count,
               EXISTS(SELECT 1 FROM subscriptions s
                 WHERE s.channel_id = u.id AND s.subscriber_id = $2) AS is_subscribed
        FROM users u
        WHERE u.user_name = $1
        "#,
    )
    .bind(user_name)
    .bind(viewer_id)
    .fetch_optional(db)
    .await?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_serializes_camel_case() {
        let profile = ChannelProfile {
            id: Uuid::new_v4(),
            user_name: "alice".into(),
            full_name: "Alice A".into(),
            avatar_url: "https://cdn.local/a.png".into(),
            cover_image_url: None,
            subscribers_count: 3,
            channels_subscribed_to_count: 1,
            is_subscribed: true,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["subscribersCount"], 3);
        assert_eq!(json["channelsSubscribedToCount"], 1);
        assert_eq!(json["isSubscribed"], true);
        assert!(json.get("email").is_none());
    }
}
