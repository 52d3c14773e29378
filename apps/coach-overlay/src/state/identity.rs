use coach_proto::PlayerIdentity;

/// Header badge for the logged-in character.
#[derive(Debug, Default)]
pub struct IdentityBadge {
    current: Option<PlayerIdentity>,
}

impl IdentityBadge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the identity. A payload without a GUID clears the badge.
    pub fn apply(&mut self, identity: PlayerIdentity) {
        self.current = identity.is_known().then_some(identity);
    }

    pub fn identity(&self) -> Option<&PlayerIdentity> {
        self.current.as_ref()
    }

    /// `Name-Realm (Spec Class)`, or `None` before the add-on reports in.
    pub fn label(&self) -> Option<String> {
        let id = self.current.as_ref()?;
        let mut label = if id.realm.is_empty() {
            id.name.clone()
        } else {
            format!("{}-{}", id.name, id.realm)
        };
        let detail = [id.spec.as_str(), id.class.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !detail.is_empty() {
            label.push_str(&format!(" ({detail})"));
        }
        Some(label)
    }
}
