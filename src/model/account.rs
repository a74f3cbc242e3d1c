use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct AdminAccount {
    pub id: u64,
    pub nom: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct AgentAccount {
    pub id: u64,
    pub immatricule: String,
    pub nom: String,
    pub prenom: Option<String>,
    pub email: Option<String>,
    /// Argon2 PHC string; agents without one cannot log in.
    pub mot_de_passe: Option<String>,
}

/// Account fields safe to return to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: u64,
    pub nom: String,
    pub prenom: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub immatricule: Option<String>,
}

impl From<&AdminAccount> for AccountView {
    fn from(admin: &AdminAccount) -> Self {
        Self {
            id: admin.id,
            nom: admin.nom.clone(),
            prenom: None,
            email: Some(admin.email.clone()),
            immatricule: None,
        }
    }
}

impl From<&AgentAccount> for AccountView {
    fn from(agent: &AgentAccount) -> Self {
        Self {
            id: agent.id,
            nom: agent.nom.clone(),
            prenom: agent.prenom.clone(),
            email: agent.email.clone(),
            immatricule: Some(agent.immatricule.clone()),
        }
    }
}
