use anyhow::Result;

use crate::client::api::ApiClient;
use crate::client::uploads::{self, UploadEvent};
use crate::models::{AddressEntity, UserEntity};

/// Render-ready state of the profile view. The view starts in `Loading`
/// until the mount fetch completes.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    Loading,
    Loaded {
        user: UserEntity,
        address: Option<AddressEntity>,
    },
}

impl ProfileState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ProfileState::Loading)
    }
}

/// Typed actions applied to the profile state. Every mutation is
/// confirm-then-refetch: an action only exists once its API call succeeded.
#[derive(Debug, Clone)]
pub enum ProfileAction {
    ProfileFetched {
        user: UserEntity,
        address: Option<AddressEntity>,
    },
    AddressRefetched {
        address: Option<AddressEntity>,
    },
    ProfilePictureUpdated {
        user: UserEntity,
    },
}

/// Pure reducer over the profile state. Address and picture updates only
/// apply to a loaded view; a view still loading keeps waiting for its
/// initial fetch.
pub fn reduce(state: ProfileState, action: ProfileAction) -> ProfileState {
    match (state, action) {
        (_, ProfileAction::ProfileFetched { user, address }) => {
            ProfileState::Loaded { user, address }
        }
        (ProfileState::Loaded { user, .. }, ProfileAction::AddressRefetched { address }) => {
            ProfileState::Loaded { user, address }
        }
        (ProfileState::Loaded { address, .. }, ProfileAction::ProfilePictureUpdated { user }) => {
            ProfileState::Loaded { user, address }
        }
        (state, _) => state,
    }
}

/// The profile view: owns its API client explicitly instead of reaching
/// into a shared global store, and applies every change through [`reduce`].
pub struct ProfileView {
    api: ApiClient,
    state: ProfileState,
}

impl ProfileView {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: ProfileState::Loading,
        }
    }

    pub fn state(&self) -> &ProfileState {
        &self.state
    }

    /// Initial fetch dispatched when the view mounts.
    pub async fn mount(&mut self) -> Result<()> {
        let user = self.api.get_me().await?;
        let address = self.api.get_address().await?;
        self.apply(ProfileAction::ProfileFetched { user, address });
        Ok(())
    }

    /// Delete the shown address, then re-fetch. A failed delete leaves the
    /// state untouched.
    pub async fn delete_address(&mut self, address_id: i32) -> Result<()> {
        self.api.delete_address(address_id).await?;
        let address = self.api.get_address().await?;
        self.apply(ProfileAction::AddressRefetched { address });
        Ok(())
    }

    /// Handle one upload-widget callback. Only an error-free success event
    /// reaches the API; everything else is a no-op.
    pub async fn on_upload_event(
        &mut self,
        error: Option<String>,
        result: Option<UploadEvent>,
    ) -> Result<()> {
        let Some(image_url) = uploads::secure_url(error, result) else {
            return Ok(());
        };
        let user = self.api.update_profile_picture(&image_url).await?;
        self.apply(ProfileAction::ProfilePictureUpdated { user });
        Ok(())
    }

    fn apply(&mut self, action: ProfileAction) {
        let state = std::mem::replace(&mut self.state, ProfileState::Loading);
        self.state = reduce(state, action);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(image_url: &str) -> UserEntity {
        UserEntity {
            id: 1,
            username: "meena".to_owned(),
            email: "meena@example.com".to_owned(),
            is_admin: false,
            is_super_admin: false,
            image_url: image_url.to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn address() -> AddressEntity {
        AddressEntity {
            id: 11,
            user_id: 1,
            mobile: "9876543210".to_owned(),
            flat: "4B".to_owned(),
            street: "MG Road".to_owned(),
            landmark: "Near the park".to_owned(),
            city: "Bengaluru".to_owned(),
            state: "Karnataka".to_owned(),
            country: "India".to_owned(),
            pin_code: "560001".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fetch_moves_loading_to_loaded() {
        let state = reduce(
            ProfileState::Loading,
            ProfileAction::ProfileFetched {
                user: user(""),
                address: Some(address()),
            },
        );
        match state {
            ProfileState::Loaded { address, .. } => assert!(address.is_some()),
            ProfileState::Loading => panic!("view should be loaded"),
        }
    }

    #[test]
    fn address_refetch_after_delete_clears_the_card() {
        let loaded = ProfileState::Loaded {
            user: user(""),
            address: Some(address()),
        };
        let state = reduce(loaded, ProfileAction::AddressRefetched { address: None });
        match state {
            ProfileState::Loaded { user, address } => {
                assert_eq!(user.username, "meena");
                assert!(address.is_none());
            }
            ProfileState::Loading => panic!("view should stay loaded"),
        }
    }

    #[test]
    fn picture_update_keeps_the_address() {
        let loaded = ProfileState::Loaded {
            user: user(""),
            address: Some(address()),
        };
        let state = reduce(
            loaded,
            ProfileAction::ProfilePictureUpdated {
                user: user("https://images.example.com/new.png"),
            },
        );
        match state {
            ProfileState::Loaded { user, address } => {
                assert_eq!(user.image_url, "https://images.example.com/new.png");
                assert!(address.is_some());
            }
            ProfileState::Loading => panic!("view should stay loaded"),
        }
    }

    #[test]
    fn mutation_actions_are_ignored_while_loading() {
        let state = reduce(
            ProfileState::Loading,
            ProfileAction::AddressRefetched { address: None },
        );
        assert!(state.is_loading());

        let state = reduce(
            ProfileState::Loading,
            ProfileAction::ProfilePictureUpdated { user: user("") },
        );
        assert!(state.is_loading());
    }
}
