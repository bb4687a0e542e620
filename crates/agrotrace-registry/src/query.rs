use agrotrace_core::error::AgroError;
use agrotrace_core::registry::{CertificationAuthority, HandlerRecord};
use agrotrace_core::types::Principal;
use agrotrace_state::StateDb;

pub struct RegistryQuery<'a> {
    db: &'a StateDb,
}

impl<'a> RegistryQuery<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    pub fn get_handler(&self, id: &Principal) -> Result<Option<HandlerRecord>, AgroError> {
        self.db.get_handler(id)
    }

    /// Registered and currently active.
    pub fn is_authorized_handler(&self, id: &Principal) -> Result<bool, AgroError> {
        Ok(self.db.get_handler(id)?.is_some_and(|h| h.active))
    }

    pub fn active_handlers(&self) -> Result<Vec<HandlerRecord>, AgroError> {
        let mut handlers = self.db.iter_handlers()?;
        handlers.retain(|h| h.active);
        Ok(handlers)
    }

    pub fn get_authority(&self, id: &Principal) -> Result<Option<CertificationAuthority>, AgroError> {
        self.db.get_authority(id)
    }

    pub fn is_authorized_for_cert_type(
        &self,
        id: &Principal,
        cert_type: &str,
    ) -> Result<bool, AgroError> {
        Ok(self.db.get_authority(id)?.is_some_and(|a| a.permits(cert_type)))
    }

    /// Active authorities able to issue `cert_type`.
    pub fn authorities_for(&self, cert_type: &str) -> Result<Vec<CertificationAuthority>, AgroError> {
        let mut authorities = self.db.iter_authorities()?;
        authorities.retain(|a| a.permits(cert_type));
        Ok(authorities)
    }
}
