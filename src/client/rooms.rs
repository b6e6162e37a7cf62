//! Room features of the client: listing, creating, joining, leaving and deleting.

use super::RoommateApp;
use crate::{
    cache::keys,
    core::room::{self, MemberProfile, RoomWithCount},
    entities::room as room_entity,
    errors::Result,
    notifications::PushNotifier,
    realtime::{ChangeEvent, ChangeKind, Table},
};
use tracing::error;

impl<N: PushNotifier> RoommateApp<N> {
    /// Rooms from the last successful fetch, without touching the backend.
    pub async fn cached_rooms(&self) -> Vec<RoomWithCount> {
        self.cache
            .get(keys::USER_ROOMS)
            .await
            .unwrap_or_default()
    }

    /// Rooms of the signed-in user, refreshed from the backend.
    ///
    /// Falls back to the cached list when the fetch fails; empty when signed out.
    pub async fn rooms(&self) -> Vec<RoomWithCount> {
        let Some(user) = self.current_user().await else {
            return Vec::new();
        };

        match room::get_rooms_for_user(self.db(), &user.id).await {
            Ok(rooms) => {
                self.cache.set(keys::USER_ROOMS, &rooms, true).await;
                rooms
            }
            Err(e) => {
                error!("Error fetching rooms: {}", e);
                self.cached_rooms().await
            }
        }
    }

    /// Members of a room with their display fields.
    ///
    /// Empty when signed out, when the signed-in user is not a member, or when the fetch
    /// fails.
    pub async fn members(&self, room_id: &str) -> Vec<MemberProfile> {
        let Some(user) = self.current_user().await else {
            return Vec::new();
        };

        let fetched = match room::is_member(self.db(), room_id, &user.id).await {
            Ok(false) => return Vec::new(),
            Ok(true) => room::get_room_members(self.db(), room_id).await,
            Err(e) => Err(e),
        };
        fetched
            .inspect_err(|e| error!("Error fetching room members: {}", e))
            .unwrap_or_default()
    }

    /// Creates a room owned by the signed-in user.
    pub async fn create_room(&self, name: &str, description: &str) -> Result<room_entity::Model> {
        let user = self.require_user().await?;
        let created = room::create_room(self.db(), name, description, &user.id).await?;

        self.feed.publish(ChangeEvent::new(
            Table::Rooms,
            ChangeKind::Insert,
            Some(created.id.clone()),
            created.id.as_str(),
        ));
        self.feed.publish(ChangeEvent::new(
            Table::RoomMembers,
            ChangeKind::Insert,
            Some(created.id.clone()),
            user.id.as_str(),
        ));
        self.rooms().await;
        Ok(created)
    }

    /// Joins a room by invite code.
    pub async fn join_room(&self, invite_code: &str) -> Result<room_entity::Model> {
        let user = self.require_user().await?;
        let joined = room::join_room(self.db(), invite_code, &user.id).await?;

        self.feed.publish(ChangeEvent::new(
            Table::RoomMembers,
            ChangeKind::Insert,
            Some(joined.id.clone()),
            user.id.as_str(),
        ));
        self.rooms().await;
        Ok(joined)
    }

    /// Leaves a room. The room and its ledger remain for the other members.
    pub async fn leave_room(&self, room_id: &str) -> Result<()> {
        let user = self.require_user().await?;
        room::leave_room(self.db(), room_id, &user.id).await?;

        self.feed.publish(ChangeEvent::new(
            Table::RoomMembers,
            ChangeKind::Delete,
            Some(room_id.to_string()),
            user.id.as_str(),
        ));
        self.forget_room(room_id).await;
        Ok(())
    }

    /// Deletes a room with all its members and transactions. Creator only.
    pub async fn delete_room(&self, room_id: &str) -> Result<()> {
        let user = self.require_user().await?;
        room::delete_room(self.db(), room_id, &user.id).await?;

        // Members and ledger go with the room
        for table in [Table::Rooms, Table::RoomMembers, Table::Transactions] {
            self.feed.publish(ChangeEvent::new(
                table,
                ChangeKind::Delete,
                Some(room_id.to_string()),
                room_id,
            ));
        }
        self.forget_room(room_id).await;
        Ok(())
    }

    async fn forget_room(&self, room_id: &str) {
        self.cache.remove(&keys::transactions(room_id)).await;
        self.cache.remove(&keys::summary(room_id)).await;
        self.rooms().await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Error;
    use crate::realtime::SubscriptionFilter;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_rooms_signed_out_is_empty() -> Result<()> {
        let app = setup_test_app().await?;
        assert!(app.rooms().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_room_requires_session() -> Result<()> {
        let app = setup_test_app().await?;
        let result = app.create_room("Apt 4B", "").await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_room_caches_and_publishes() -> Result<()> {
        let app = setup_test_app().await?;
        sign_up_test_user(&app, "Alice").await?;
        let mut sub = app.feed().subscribe(SubscriptionFilter::table(Table::Rooms));

        let created = app.create_room("Apt 4B", "Third floor").await?;

        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.row_id, created.id);

        let cached = app.cached_rooms().await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].room.id, created.id);
        assert_eq!(cached[0].member_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_join_room_and_members() -> Result<()> {
        let app = setup_test_app().await?;
        sign_up_test_user(&app, "Alice").await?;
        let created = app.create_room("Apt 4B", "").await?;

        let other = app_sharing(&app);
        sign_up_test_user(&other, "Bob").await?;
        let joined = other
            .join_room(&format!(" {} ", created.invite_code.to_lowercase()))
            .await?;
        assert_eq!(joined.id, created.id);

        let names: Vec<String> = other.members(&created.id).await.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);

        let again = other.join_room(&created.invite_code).await;
        assert!(matches!(again, Err(Error::AlreadyMember { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_members_hidden_from_outsiders() -> Result<()> {
        let app = setup_test_app().await?;
        sign_up_test_user(&app, "Alice").await?;
        let created = app.create_room("Apt 4B", "").await?;

        let outsider = app_sharing(&app);
        assert!(outsider.members(&created.id).await.is_empty());

        sign_up_test_user(&outsider, "Mallory").await?;
        assert!(outsider.members(&created.id).await.is_empty());
        assert_eq!(app.members(&created.id).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_join_unknown_code() -> Result<()> {
        let app = setup_test_app().await?;
        sign_up_test_user(&app, "Alice").await?;
        let result = app.join_room("ZZZZZZ").await;
        assert!(matches!(result, Err(Error::InvalidInviteCode { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_room_only_by_creator() -> Result<()> {
        let app = setup_test_app().await?;
        sign_up_test_user(&app, "Alice").await?;
        let created = app.create_room("Apt 4B", "").await?;

        let other = app_sharing(&app);
        sign_up_test_user(&other, "Bob").await?;
        other.join_room(&created.invite_code).await?;
        assert!(matches!(
            other.delete_room(&created.id).await,
            Err(Error::NotRoomCreator { .. })
        ));

        let mut ledger = app
            .feed()
            .subscribe(SubscriptionFilter::room(Table::Transactions, created.id.as_str()));
        app.delete_room(&created.id).await?;
        let event = ledger.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(app.rooms().await.is_empty());
        assert!(app.cached_rooms().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_leave_room_drops_it_from_list() -> Result<()> {
        let app = setup_test_app().await?;
        sign_up_test_user(&app, "Alice").await?;
        let created = app.create_room("Apt 4B", "").await?;

        let other = app_sharing(&app);
        sign_up_test_user(&other, "Bob").await?;
        other.join_room(&created.invite_code).await?;
        assert_eq!(other.rooms().await.len(), 1);

        other.leave_room(&created.id).await?;
        assert!(other.rooms().await.is_empty());
        assert_eq!(app.members(&created.id).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_rooms_fall_back_to_cache_on_backend_failure() -> Result<()> {
        let app = setup_test_app().await?;
        sign_up_test_user(&app, "Alice").await?;
        app.create_room("Apt 4B", "").await?;

        let broken = app_with_broken_backend(&app).await?;
        let rooms = broken.rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room.name, "Apt 4B");
        Ok(())
    }
}
