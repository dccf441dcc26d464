use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of whoever asks for a quote or redeems a promotion.
/// Either reference may be absent; matching uses whichever both sides carry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

impl Requester {
    pub fn user(id: Uuid) -> Self {
        Self {
            user_id: Some(id),
            client_id: None,
        }
    }

    pub fn client(id: Uuid) -> Self {
        Self {
            user_id: None,
            client_id: Some(id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none() && self.client_id.is_none()
    }

    pub fn matches(&self, user_id: Option<Uuid>, client_id: Option<Uuid>) -> bool {
        let same_user = matches!((self.user_id, user_id), (Some(a), Some(b)) if a == b);
        let same_client = matches!((self.client_id, client_id), (Some(a), Some(b)) if a == b);

        same_user || same_client
    }
}

#[test]
fn requester_matches_on_either_reference() {
    let user = Uuid::new_v4();
    let client = Uuid::new_v4();

    let requester = Requester {
        user_id: Some(user),
        client_id: Some(client),
    };

    assert!(requester.matches(Some(user), None));
    assert!(requester.matches(None, Some(client)));
    assert!(!requester.matches(Some(client), Some(user)));
    assert!(!Requester::default().matches(None, None));
}
