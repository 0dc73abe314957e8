//! Identity resolver.
//!
//! Maps (nick, ident, host) observations to durable user ids, creating and
//! updating records as needed. Unresolved lookups are `Ok(None)`, never errors;
//! only storage faults surface as [`StorageError`].

use super::{Actor, Observation};
use crate::db::{Database, StorageError, User, UserId};
use tracing::{debug, info, warn};

/// Result of merging two users by nickname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Records were merged into the surviving (smaller) id.
    Merged { from: UserId, to: UserId },
    /// Both nicks already resolve to the same user.
    AlreadyMerged,
    /// At least one side is not a known user, or the store refused.
    Unknown,
}

/// Sole owner of the identity store.
#[derive(Clone)]
pub struct IdentityResolver {
    db: Database,
}

impl IdentityResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve an observation to a user id.
    ///
    /// - nick and host both present: match by either, creating a user when
    ///   neither is known. Conflicting matches yield `None` and write nothing.
    /// - nick only: nick history lookup.
    /// - host only: host history lookup.
    pub async fn resolve(&self, observation: &Observation) -> Result<Option<UserId>, StorageError> {
        match (observation.nick(), observation.hostmask()) {
            (Some(nick), Some(host)) => self.resolve_full(nick, &host).await,
            (Some(nick), None) => self.resolve_nick(nick).await,
            (None, Some(host)) => self.resolve_host(&host).await,
            (None, None) => Ok(None),
        }
    }

    async fn resolve_full(&self, nick: &str, host: &str) -> Result<Option<UserId>, StorageError> {
        let repo = self.db.identities();

        let by_host = repo.find_user_by_host(host).await?;
        let by_nick = repo.find_user_by_nick(nick).await?;

        let user_id = match (by_nick, by_host) {
            (None, None) => {
                let user = repo.insert_user(nick, host).await?;
                info!(nick = %nick, host = %host, user_id = user.id, "New user");
                user.id
            }
            (Some(id), None) | (None, Some(id)) => id,
            (Some(nick_id), Some(host_id)) if nick_id == host_id => nick_id,
            (Some(nick_id), Some(host_id)) => {
                // Known gap: no reconciliation is attempted for split identities.
                warn!(
                    nick = %nick,
                    host = %host,
                    nick_user = nick_id,
                    host_user = host_id,
                    "Identity conflict, leaving unresolved"
                );
                return Ok(None);
            }
        };

        repo.upsert_nick(user_id, nick).await?;
        repo.upsert_host(user_id, host).await?;

        Ok(Some(user_id))
    }

    /// Look up a user by nick history only.
    pub async fn resolve_nick(&self, nick: &str) -> Result<Option<UserId>, StorageError> {
        debug!(nick = %nick, "Getting user id for nick");
        self.db.identities().find_user_by_nick(nick).await
    }

    /// Look up a user by `ident@hostname` history only.
    pub async fn resolve_host(&self, host: &str) -> Result<Option<UserId>, StorageError> {
        debug!(host = %host, "Getting user id for host");
        self.db.identities().find_user_by_host(host).await
    }

    /// Record a nick change for a known user.
    pub async fn change_nick(&self, user_id: UserId, new_nick: &str) -> Result<(), StorageError> {
        self.db.identities().upsert_nick(user_id, new_nick).await
    }

    /// Resolve the sender of a NICK event and record the new nick.
    ///
    /// Returns the resolved id, or `None` when the sender could not be resolved.
    pub async fn changed_nick(
        &self,
        observation: &Observation,
        new_nick: &str,
    ) -> Result<Option<UserId>, StorageError> {
        let user_id = self.resolve(observation).await?;
        if let Some(id) = user_id {
            self.change_nick(id, new_nick).await?;
        }
        Ok(user_id)
    }

    /// Fetch a stored user.
    pub async fn user(&self, user_id: UserId) -> Result<Option<User>, StorageError> {
        self.db.identities().find_user_by_id(user_id).await
    }

    /// Resolve an observation and rebuild the stored user behind it.
    pub async fn full_user(&self, observation: &Observation) -> Result<Option<User>, StorageError> {
        match self.resolve(observation).await? {
            Some(id) => self.user(id).await,
            None => Ok(None),
        }
    }

    /// Resolve an observation into an [`Actor`] for event delivery.
    pub async fn actor(&self, observation: &Observation) -> Result<Actor, StorageError> {
        let user_id = self.resolve(observation).await?;
        Ok(Actor::from_observation(observation, user_id))
    }

    /// Rebuild an actor from a bare nick, falling back to an unresolved actor.
    pub async fn actor_by_nick(&self, nick: &str) -> Result<Actor, StorageError> {
        let user = match self.resolve_nick(nick).await? {
            Some(id) => self.user(id).await?,
            None => None,
        };
        Ok(user
            .map(|u| Actor::from_user(&u))
            .unwrap_or_else(|| Actor::unknown(nick)))
    }

    /// All known users.
    pub async fn users(&self) -> Result<Vec<User>, StorageError> {
        self.db.identities().list_users().await
    }

    /// Merge two identities. The larger id always folds into the smaller.
    ///
    /// Returns false when the ids are equal or either user does not exist.
    pub async fn merge(&self, a: UserId, b: UserId) -> Result<bool, StorageError> {
        if a == b {
            return Ok(false);
        }
        let (from, to) = if a > b { (a, b) } else { (b, a) };

        let merged = self.db.identities().merge_users(from, to).await?;
        if merged {
            info!(from = from, to = to, "Merged users");
        } else {
            debug!(from = from, to = to, "Merge skipped, user missing");
        }
        Ok(merged)
    }

    /// Merge the users currently holding two nicknames.
    pub async fn merge_nicks(&self, a: &str, b: &str) -> Result<MergeOutcome, StorageError> {
        let (Some(id_a), Some(id_b)) = (self.resolve_nick(a).await?, self.resolve_nick(b).await?)
        else {
            return Ok(MergeOutcome::Unknown);
        };

        if id_a == id_b {
            return Ok(MergeOutcome::AlreadyMerged);
        }

        if self.merge(id_a, id_b).await? {
            Ok(MergeOutcome::Merged {
                from: id_a.max(id_b),
                to: id_a.min(id_b),
            })
        } else {
            Ok(MergeOutcome::Unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn resolver() -> IdentityResolver {
        IdentityResolver::new(Database::new(":memory:").await.unwrap())
    }

    fn obs(nick: &str, ident: &str, host: &str) -> Observation {
        Observation::new(nick, ident, host)
    }

    #[tokio::test]
    async fn unseen_observation_creates_one_user() {
        let resolver = resolver().await;

        let id = resolver.resolve(&obs("alice", "al", "home.example")).await.unwrap();
        let id = id.expect("new user");

        let users = resolver.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, id);
        assert_eq!(resolver.resolve_nick("alice").await.unwrap(), Some(id));
        assert_eq!(resolver.resolve_host("al@home.example").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn repeated_observation_is_stable() {
        let resolver = resolver().await;
        let first = resolver.resolve(&obs("alice", "al", "home")).await.unwrap();
        let second = resolver.resolve(&obs("alice", "al", "home")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_host_new_nick_keeps_identity() {
        let resolver = resolver().await;

        let id = resolver.resolve(&obs("alice", "al", "home")).await.unwrap();
        let again = resolver.resolve(&obs("alice_away", "al", "home")).await.unwrap();

        assert_eq!(id, again);
        assert_eq!(resolver.resolve_nick("alice_away").await.unwrap(), id);
        assert_eq!(resolver.resolve_nick("alice").await.unwrap(), id);

        let user = resolver.user(id.unwrap()).await.unwrap().unwrap();
        assert_eq!(user.last_nick, "alice_away");
    }

    #[tokio::test]
    async fn same_nick_new_host_keeps_identity() {
        let resolver = resolver().await;

        let id = resolver.resolve(&obs("alice", "al", "home")).await.unwrap();
        let again = resolver.resolve(&obs("alice", "al", "work")).await.unwrap();

        assert_eq!(id, again);
        assert_eq!(resolver.resolve_host("al@work").await.unwrap(), id);
    }

    #[tokio::test]
    async fn conflicting_nick_and_host_stay_unresolved() {
        let resolver = resolver().await;

        let x = resolver.resolve(&obs("bob", "b", "bob.example")).await.unwrap().unwrap();
        let y = resolver.resolve(&obs("carol", "c", "carol.example")).await.unwrap().unwrap();
        assert_ne!(x, y);

        let before_x = resolver.user(x).await.unwrap().unwrap();
        let before_y = resolver.user(y).await.unwrap().unwrap();

        let result = resolver.resolve(&obs("bob", "c", "carol.example")).await.unwrap();
        assert_eq!(result, None);

        assert_eq!(resolver.user(x).await.unwrap().unwrap(), before_x);
        assert_eq!(resolver.user(y).await.unwrap().unwrap(), before_y);
        let repo = resolver.db.identities();
        assert_eq!(repo.nicks_of(x).await.unwrap(), vec!["bob"]);
        assert_eq!(repo.hosts_of(y).await.unwrap(), vec!["c@carol.example"]);
        assert_eq!(resolver.users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn partial_observations_only_look_up() {
        let resolver = resolver().await;

        assert_eq!(resolver.resolve(&Observation::nick_only("ghost")).await.unwrap(), None);
        assert_eq!(resolver.resolve(&obs("", "g", "ghost.example")).await.unwrap(), None);
        assert_eq!(resolver.resolve(&Observation::default()).await.unwrap(), None);
        assert!(resolver.users().await.unwrap().is_empty());

        let id = resolver.resolve(&obs("dave", "d", "dave.example")).await.unwrap();
        assert_eq!(resolver.resolve(&Observation::nick_only("DAVE")).await.unwrap(), id);
        assert_eq!(resolver.resolve(&obs("", "d", "dave.example")).await.unwrap(), id);
    }

    #[tokio::test]
    async fn changed_nick_records_history() {
        let resolver = resolver().await;
        let sender = obs("erin", "e", "erin.example");
        let id = resolver.resolve(&sender).await.unwrap();

        let changed = resolver.changed_nick(&sender, "erin_").await.unwrap();
        assert_eq!(changed, id);
        assert_eq!(resolver.resolve_nick("erin_").await.unwrap(), id);
        assert_eq!(resolver.user(id.unwrap()).await.unwrap().unwrap().last_nick, "erin_");
    }

    #[tokio::test]
    async fn merge_same_id_is_noop() {
        let resolver = resolver().await;
        let id = resolver.resolve(&obs("frank", "f", "f.example")).await.unwrap().unwrap();
        assert!(!resolver.merge(id, id).await.unwrap());
        assert!(resolver.user(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn merge_keeps_smaller_id_regardless_of_argument_order() {
        let resolver = resolver().await;
        let a = resolver.resolve(&obs("gina", "g", "one")).await.unwrap().unwrap();
        let b = resolver.resolve(&obs("gina_alt", "ga", "two")).await.unwrap().unwrap();
        assert!(a < b);

        assert!(resolver.merge(b, a).await.unwrap());

        assert!(resolver.user(b).await.unwrap().is_none());
        assert_eq!(resolver.resolve_nick("gina_alt").await.unwrap(), Some(a));
        assert_eq!(resolver.resolve_host("ga@two").await.unwrap(), Some(a));
        assert_eq!(resolver.resolve(&obs("gina_alt", "ga", "two")).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn merge_with_deleted_user_fails() {
        let resolver = resolver().await;
        let a = resolver.resolve(&obs("hal", "h", "one")).await.unwrap().unwrap();
        let b = resolver.resolve(&obs("ian", "i", "two")).await.unwrap().unwrap();

        assert!(resolver.merge(a, b).await.unwrap());
        assert!(!resolver.merge(a, b).await.unwrap());
        assert!(!resolver.merge(a, b + 50).await.unwrap());
    }

    #[tokio::test]
    async fn merge_resolves_former_conflict() {
        let resolver = resolver().await;
        let x = resolver.resolve(&obs("bob", "b", "bob.example")).await.unwrap().unwrap();
        let y = resolver.resolve(&obs("carol", "c", "carol.example")).await.unwrap().unwrap();
        assert_eq!(resolver.resolve(&obs("bob", "c", "carol.example")).await.unwrap(), None);

        assert_eq!(
            resolver.merge_nicks("bob", "carol").await.unwrap(),
            MergeOutcome::Merged { from: y, to: x }
        );
        assert_eq!(resolver.resolve(&obs("bob", "c", "carol.example")).await.unwrap(), Some(x));
        assert_eq!(
            resolver.merge_nicks("bob", "carol").await.unwrap(),
            MergeOutcome::AlreadyMerged
        );
        assert_eq!(
            resolver.merge_nicks("bob", "nobody").await.unwrap(),
            MergeOutcome::Unknown
        );
    }

    #[tokio::test]
    async fn actor_by_nick_falls_back_to_unknown() {
        let resolver = resolver().await;
        let id = resolver.resolve(&obs("jo", "j", "jo.example")).await.unwrap();

        let known = resolver.actor_by_nick("JO").await.unwrap();
        assert_eq!(known.user_id, id);
        assert_eq!(known.hostname.as_deref(), Some("jo.example"));

        let unknown = resolver.actor_by_nick("stranger").await.unwrap();
        assert_eq!(unknown, Actor::unknown("stranger"));
    }
}
