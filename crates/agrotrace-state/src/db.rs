use std::collections::BTreeMap;
use std::path::Path;

use agrotrace_core::error::AgroError;
use agrotrace_core::participant::{Participant, Permission, Role};
use agrotrace_core::product::{Certification, EventRecord, Product};
use agrotrace_core::registry::{CertificationAuthority, HandlerRecord};
use agrotrace_core::types::{Principal, ProductId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{TransactionError, TransactionResult};
use sled::Transactional;

const NEXT_PRODUCT_ID_KEY: &[u8] = b"next_product_id";
const ROLE_COUNT_TAG: u8 = b'r';
const EVENT_COUNT_TAG: u8 = b'e';

// ── Staged mutations ──────────────────────────────────────────────────────────

/// Every write a call produces, collected before the atomic commit.
///
/// Counter fields hold the new absolute values, not deltas.
#[derive(Default, Debug)]
pub struct StagedMutations {
    pub participants: Vec<Participant>,
    /// (set, member, present-after-commit)
    pub grants: Vec<(Permission, Principal, bool)>,
    pub role_counts: BTreeMap<Role, u64>,
    pub handlers: Vec<HandlerRecord>,
    pub authorities: Vec<CertificationAuthority>,
    pub products: Vec<Product>,
    pub certifications: Vec<Certification>,
    pub events: Vec<EventRecord>,
    pub event_counts: BTreeMap<ProductId, u64>,
    pub next_product_id: Option<ProductId>,
}

impl StagedMutations {
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
            && self.grants.is_empty()
            && self.role_counts.is_empty()
            && self.handlers.is_empty()
            && self.authorities.is_empty()
            && self.products.is_empty()
            && self.certifications.is_empty()
            && self.events.is_empty()
            && self.event_counts.is_empty()
            && self.next_product_id.is_none()
    }
}

/// Staged writes reduced to raw key/value pairs per tree.
#[derive(Default)]
struct EncodedWrites {
    participants: Vec<(Vec<u8>, Vec<u8>)>,
    grants: Vec<(Vec<u8>, bool)>,
    handlers: Vec<(Vec<u8>, Vec<u8>)>,
    authorities: Vec<(Vec<u8>, Vec<u8>)>,
    products: Vec<(Vec<u8>, Vec<u8>)>,
    certifications: Vec<(Vec<u8>, Vec<u8>)>,
    events: Vec<(Vec<u8>, Vec<u8>)>,
    counters: Vec<(Vec<u8>, Vec<u8>)>,
}

impl EncodedWrites {
    fn encode(staged: &StagedMutations) -> Result<Self, AgroError> {
        let mut w = EncodedWrites::default();
        for p in &staged.participants {
            w.participants.push((p.id.as_bytes().to_vec(), encode(p)?));
        }
        for (perm, who, member) in &staged.grants {
            w.grants.push((grant_key(*perm, who), *member));
        }
        for h in &staged.handlers {
            w.handlers.push((h.handler_id.as_bytes().to_vec(), encode(h)?));
        }
        for a in &staged.authorities {
            w.authorities.push((a.authority_id.as_bytes().to_vec(), encode(a)?));
        }
        for p in &staged.products {
            w.products.push((p.id.to_be_bytes().to_vec(), encode(p)?));
        }
        for c in &staged.certifications {
            w.certifications.push((cert_key(c.product_id, &c.cert_type), encode(c)?));
        }
        for e in &staged.events {
            w.events.push((event_key(e.product_id, e.index), encode(e)?));
        }
        for (role, count) in &staged.role_counts {
            w.counters.push((role_count_key(*role), count.to_be_bytes().to_vec()));
        }
        for (product_id, count) in &staged.event_counts {
            w.counters.push((event_count_key(*product_id), count.to_be_bytes().to_vec()));
        }
        if let Some(next) = staged.next_product_id {
            w.counters.push((NEXT_PRODUCT_ID_KEY.to_vec(), next.to_be_bytes().to_vec()));
        }
        Ok(w)
    }
}

// ── StateDb ───────────────────────────────────────────────────────────────────

/// Persistent registry state backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   participants   — Principal bytes            → bincode(Participant)
///   grants         — tag ‖ Principal bytes       → [] (membership set)
///   handlers       — Principal bytes            → bincode(HandlerRecord)
///   authorities    — Principal bytes            → bincode(CertificationAuthority)
///   products       — ProductId BE               → bincode(Product)
///   certifications — ProductId BE ‖ cert type    → bincode(Certification)
///   events         — ProductId BE ‖ index BE     → bincode(EventRecord)
///   counters       — tagged key                 → u64 BE
///   meta           — utf8 key bytes             → raw bytes
pub struct StateDb {
    _db: sled::Db,
    participants: sled::Tree,
    grants: sled::Tree,
    handlers: sled::Tree,
    authorities: sled::Tree,
    products: sled::Tree,
    certifications: sled::Tree,
    events: sled::Tree,
    counters: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AgroError> {
        let db = sled::open(path).map_err(storage)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop. Used by tests and dry runs.
    pub fn open_temporary() -> Result<Self, AgroError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, AgroError> {
        let participants   = db.open_tree("participants").map_err(storage)?;
        let grants         = db.open_tree("grants").map_err(storage)?;
        let handlers       = db.open_tree("handlers").map_err(storage)?;
        let authorities    = db.open_tree("authorities").map_err(storage)?;
        let products       = db.open_tree("products").map_err(storage)?;
        let certifications = db.open_tree("certifications").map_err(storage)?;
        let events         = db.open_tree("events").map_err(storage)?;
        let counters       = db.open_tree("counters").map_err(storage)?;
        let meta           = db.open_tree("meta").map_err(storage)?;
        Ok(Self {
            _db: db,
            participants,
            grants,
            handlers,
            authorities,
            products,
            certifications,
            events,
            counters,
            meta,
        })
    }

    // ── Commit ────────────────────────────────────────────────────────────────

    /// Apply every staged write in one multi-tree transaction: either all of
    /// them become visible or none do.
    pub fn commit(&self, staged: &StagedMutations) -> Result<(), AgroError> {
        if staged.is_empty() {
            return Ok(());
        }
        let w = EncodedWrites::encode(staged)?;

        let result: TransactionResult<(), AgroError> = (
            &self.participants,
            &self.grants,
            &self.handlers,
            &self.authorities,
            &self.products,
            &self.certifications,
            &self.events,
            &self.counters,
        )
            .transaction(
                |(participants, grants, handlers, authorities, products, certifications, events, counters)| {
                    for (k, v) in &w.participants {
                        participants.insert(k.as_slice(), v.as_slice())?;
                    }
                    for (k, member) in &w.grants {
                        if *member {
                            grants.insert(k.as_slice(), &b""[..])?;
                        } else {
                            grants.remove(k.as_slice())?;
                        }
                    }
                    for (k, v) in &w.handlers {
                        handlers.insert(k.as_slice(), v.as_slice())?;
                    }
                    for (k, v) in &w.authorities {
                        authorities.insert(k.as_slice(), v.as_slice())?;
                    }
                    for (k, v) in &w.products {
                        products.insert(k.as_slice(), v.as_slice())?;
                    }
                    for (k, v) in &w.certifications {
                        certifications.insert(k.as_slice(), v.as_slice())?;
                    }
                    for (k, v) in &w.events {
                        events.insert(k.as_slice(), v.as_slice())?;
                    }
                    for (k, v) in &w.counters {
                        counters.insert(k.as_slice(), v.as_slice())?;
                    }
                    Ok(())
                },
            );

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => AgroError::Storage(e.to_string()),
        })
    }

    // ── Participants ──────────────────────────────────────────────────────────

    pub fn get_participant(&self, id: &Principal) -> Result<Option<Participant>, AgroError> {
        get_decoded(&self.participants, id.as_bytes())
    }

    pub fn participant_exists(&self, id: &Principal) -> Result<bool, AgroError> {
        self.participants.contains_key(id.as_bytes()).map_err(storage)
    }

    // ── Permission grants ─────────────────────────────────────────────────────

    pub fn has_grant(&self, perm: Permission, who: &Principal) -> Result<bool, AgroError> {
        self.grants.contains_key(grant_key(perm, who)).map_err(storage)
    }

    pub fn iter_grants(&self, perm: Permission) -> Result<Vec<Principal>, AgroError> {
        let mut out = Vec::new();
        for item in self.grants.scan_prefix([perm.tag()]) {
            let (key, _) = item.map_err(storage)?;
            out.push(Principal::from_slice(&key[1..])?);
        }
        Ok(out)
    }

    pub fn get_role_count(&self, role: Role) -> Result<u64, AgroError> {
        get_u64(&self.counters, &role_count_key(role))
    }

    // ── Handlers & authorities ────────────────────────────────────────────────

    pub fn get_handler(&self, id: &Principal) -> Result<Option<HandlerRecord>, AgroError> {
        get_decoded(&self.handlers, id.as_bytes())
    }

    pub fn iter_handlers(&self) -> Result<Vec<HandlerRecord>, AgroError> {
        iter_decoded(self.handlers.iter())
    }

    pub fn get_authority(&self, id: &Principal) -> Result<Option<CertificationAuthority>, AgroError> {
        get_decoded(&self.authorities, id.as_bytes())
    }

    pub fn iter_authorities(&self) -> Result<Vec<CertificationAuthority>, AgroError> {
        iter_decoded(self.authorities.iter())
    }

    // ── Products ──────────────────────────────────────────────────────────────

    pub fn get_product(&self, id: ProductId) -> Result<Option<Product>, AgroError> {
        get_decoded(&self.products, &id.to_be_bytes())
    }

    /// Id the next registered product will receive (0 on a fresh store).
    pub fn next_product_id(&self) -> Result<ProductId, AgroError> {
        get_u64(&self.counters, NEXT_PRODUCT_ID_KEY)
    }

    // ── Certifications ────────────────────────────────────────────────────────

    pub fn get_certification(
        &self,
        product_id: ProductId,
        cert_type: &str,
    ) -> Result<Option<Certification>, AgroError> {
        get_decoded(&self.certifications, &cert_key(product_id, cert_type))
    }

    pub fn iter_certifications(&self, product_id: ProductId) -> Result<Vec<Certification>, AgroError> {
        iter_decoded(self.certifications.scan_prefix(product_id.to_be_bytes()))
    }

    // ── Event log ─────────────────────────────────────────────────────────────

    pub fn get_event(&self, product_id: ProductId, index: u64) -> Result<Option<EventRecord>, AgroError> {
        get_decoded(&self.events, &event_key(product_id, index))
    }

    pub fn get_event_count(&self, product_id: ProductId) -> Result<u64, AgroError> {
        get_u64(&self.counters, &event_count_key(product_id))
    }

    /// All log entries of a product, in index order.
    pub fn iter_events(&self, product_id: ProductId) -> Result<Vec<EventRecord>, AgroError> {
        iter_decoded(self.events.scan_prefix(product_id.to_be_bytes()))
    }

    // ── Meta ──────────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), AgroError> {
        self.meta.insert(key.as_bytes(), value).map_err(storage)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, AgroError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), AgroError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}

// ── Key layout ────────────────────────────────────────────────────────────────

fn grant_key(perm: Permission, who: &Principal) -> Vec<u8> {
    let mut k = Vec::with_capacity(33);
    k.push(perm.tag());
    k.extend_from_slice(who.as_bytes());
    k
}

fn cert_key(product_id: ProductId, cert_type: &str) -> Vec<u8> {
    let mut k = product_id.to_be_bytes().to_vec();
    k.extend_from_slice(cert_type.as_bytes());
    k
}

fn event_key(product_id: ProductId, index: u64) -> Vec<u8> {
    let mut k = product_id.to_be_bytes().to_vec();
    k.extend_from_slice(&index.to_be_bytes());
    k
}

fn role_count_key(role: Role) -> Vec<u8> {
    vec![ROLE_COUNT_TAG, role.code()]
}

fn event_count_key(product_id: ProductId) -> Vec<u8> {
    let mut k = vec![EVENT_COUNT_TAG];
    k.extend_from_slice(&product_id.to_be_bytes());
    k
}

// ── Codec helpers ─────────────────────────────────────────────────────────────

fn storage(e: sled::Error) -> AgroError {
    AgroError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AgroError> {
    bincode::serialize(value).map_err(|e| AgroError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AgroError> {
    bincode::deserialize(bytes).map_err(|e| AgroError::Serialization(e.to_string()))
}

fn get_decoded<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, AgroError> {
    match tree.get(key).map_err(storage)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn iter_decoded<T: DeserializeOwned>(iter: sled::Iter) -> Result<Vec<T>, AgroError> {
    let mut out = Vec::new();
    for item in iter {
        let (_, bytes) = item.map_err(storage)?;
        out.push(decode(&bytes)?);
    }
    Ok(out)
}

fn get_u64(tree: &sled::Tree, key: &[u8]) -> Result<u64, AgroError> {
    match tree.get(key).map_err(storage)? {
        Some(bytes) => {
            let arr = <[u8; 8]>::try_from(&bytes[..])
                .map_err(|_| AgroError::Serialization(format!("counter has {} bytes", bytes.len())))?;
            Ok(u64::from_be_bytes(arr))
        }
        None => Ok(0),
    }
}
