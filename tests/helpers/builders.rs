use permissions::authz::{Action, AuthorizationEngine, Role};

/// Builder for seeding an engine with grants and memberships
#[derive(Default)]
pub struct PolicyBuilder {
    grants: Vec<(String, String, Action)>,
    memberships: Vec<(String, String, Role)>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, subject: &str, resource: &str, action: Action) -> Self {
        self.grants
            .push((subject.to_string(), resource.to_string(), action));
        self
    }

    pub fn member(mut self, user: &str, group: &str, role: Role) -> Self {
        self.memberships
            .push((user.to_string(), group.to_string(), role));
        self
    }

    pub async fn apply(self, engine: &AuthorizationEngine) {
        for (user, group, role) in &self.memberships {
            engine
                .add_user_group_role(user, group, *role)
                .await
                .expect("Failed to add membership");
        }
        for (subject, resource, action) in &self.grants {
            engine
                .add_permission(subject, resource, *action)
                .await
                .expect("Failed to add grant");
        }
    }
}
