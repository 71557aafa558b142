use crate::error::{HiloError, Result};
use crate::oracle::codec::{encode_cleartexts, Plaintext};
use crate::oracle::Oracle;
use crate::types::{
    CiphertextHandle, DecryptionProof, DecryptionResponse, Identity, InputProof, RequestId,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

const NONCE_SIZE: usize = 12;
const KDF_ROUNDS: u32 = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedValue {
    pub handle: CiphertextHandle,
    pub owner: Identity,
    pub nonce: Vec<u8>,
    pub sealed: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: RequestId,
    pub handles: Vec<CiphertextHandle>,
    pub requested_at: DateTime<Utc>,
}

/// Vault contents and queue, without key material
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleState {
    pub values: Vec<SealedValue>,
    pub queue: Vec<QueuedRequest>,
    pub next_request_id: u64,
}

/// Development oracle sealing values with ChaCha20-Poly1305.
///
/// Decryption requests are queued and only answered by
/// [`LocalOracle::process_pending`], so callers see the same asynchronous
/// shape a remote oracle would give them.
pub struct LocalOracle {
    cipher: ChaCha20Poly1305,
    proof_key: [u8; 32],
    vault: RwLock<HashMap<CiphertextHandle, SealedValue>>,
    queue: Mutex<VecDeque<QueuedRequest>>,
    next_request_id: Mutex<u64>,
}

impl LocalOracle {
    /// Derive oracle keys from a passphrase using PBKDF2
    pub fn from_passphrase(passphrase: &str, salt: &[u8]) -> Self {
        let mut seed = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, KDF_ROUNDS, &mut seed);
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        let seal_key = domain_hash(&seed, b"hilo/seal", &[]);
        let proof_key = domain_hash(&seed, b"hilo/proof", &[]);

        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&seal_key)),
            proof_key,
            vault: RwLock::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            next_request_id: Mutex::new(0),
        }
    }

    /// Seal `value` on behalf of `owner`, returning its handle and input proof
    pub fn encrypt(&self, value: Plaintext, owner: &Identity) -> Result<(CiphertextHandle, InputProof)> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let tagged = value.to_tagged();
        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &tagged,
                    aad: owner.as_str().as_bytes(),
                },
            )
            .map_err(|e| HiloError::crypto(format!("Sealing failed: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(nonce);
        hasher.update(&sealed);
        let handle = CiphertextHandle(hasher.finalize().into());
        let proof = InputProof(self.input_tag(&handle, owner).to_vec());

        self.vault.write().insert(
            handle,
            SealedValue {
                handle,
                owner: owner.clone(),
                nonce: nonce.to_vec(),
                sealed,
                created_at: Utc::now(),
            },
        );

        tracing::debug!("Sealed value {} for {}", handle, owner);
        Ok((handle, proof))
    }

    /// Answer every queued request
    pub fn process_pending(&self) -> Vec<DecryptionResponse> {
        let drained: Vec<QueuedRequest> = self.queue.lock().drain(..).collect();
        let mut responses = Vec::with_capacity(drained.len());

        for request in drained {
            match self.fulfil(&request) {
                Ok(response) => responses.push(response),
                Err(e) => {
                    tracing::warn!("Dropping decryption request {}: {}", request.id, e);
                }
            }
        }

        responses
    }

    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.queue.lock().iter().map(|r| r.id).collect()
    }

    /// Sign arbitrary cleartexts as the answer to `request_id`
    pub fn sign_response(&self, request_id: RequestId, cleartexts: Vec<u8>) -> DecryptionResponse {
        let proof = DecryptionProof(self.decryption_tag(request_id, &cleartexts).to_vec());
        DecryptionResponse {
            request_id,
            cleartexts,
            proof,
        }
    }

    pub fn export_state(&self) -> OracleState {
        OracleState {
            values: self.vault.read().values().cloned().collect(),
            queue: self.queue.lock().iter().cloned().collect(),
            next_request_id: *self.next_request_id.lock(),
        }
    }

    pub fn import_state(&self, state: OracleState) {
        let mut vault = self.vault.write();
        vault.clear();
        for value in state.values {
            vault.insert(value.handle, value);
        }
        *self.queue.lock() = state.queue.into_iter().collect();
        *self.next_request_id.lock() = state.next_request_id;
    }

    fn fulfil(&self, request: &QueuedRequest) -> Result<DecryptionResponse> {
        let values = request
            .handles
            .iter()
            .map(|h| self.open(h))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Fulfilled decryption request {} ({} values)",
            request.id,
            values.len()
        );
        Ok(self.sign_response(request.id, encode_cleartexts(&values)))
    }

    fn open(&self, handle: &CiphertextHandle) -> Result<Plaintext> {
        let vault = self.vault.read();
        let value = vault
            .get(handle)
            .ok_or_else(|| HiloError::UnknownHandle(handle.to_hex()))?;

        let opened = self
            .cipher
            .decrypt(
                Nonce::from_slice(&value.nonce),
                Payload {
                    msg: &value.sealed,
                    aad: value.owner.as_str().as_bytes(),
                },
            )
            .map_err(|e| HiloError::crypto(format!("Opening {} failed: {}", handle, e)))?;

        Plaintext::from_tagged(&opened)
    }

    fn input_tag(&self, handle: &CiphertextHandle, owner: &Identity) -> [u8; 32] {
        let mut data = handle.0.to_vec();
        data.extend_from_slice(owner.as_str().as_bytes());
        domain_hash(&self.proof_key, b"hilo/input", &data)
    }

    fn decryption_tag(&self, request_id: RequestId, cleartexts: &[u8]) -> [u8; 32] {
        let mut data = request_id.0.to_be_bytes().to_vec();
        data.extend_from_slice(cleartexts);
        domain_hash(&self.proof_key, b"hilo/decrypt", &data)
    }
}

impl Oracle for LocalOracle {
    fn verify_input(
        &self,
        handle: &CiphertextHandle,
        proof: &InputProof,
        owner: &Identity,
    ) -> Result<()> {
        let vault = self.vault.read();
        let value = vault
            .get(handle)
            .ok_or_else(|| HiloError::UnknownHandle(handle.to_hex()))?;

        if &value.owner != owner || proof.0 != self.input_tag(handle, owner) {
            return Err(HiloError::InvalidInputProof(handle.to_hex()));
        }

        Ok(())
    }

    fn request_decryption(&self, handles: &[CiphertextHandle]) -> Result<RequestId> {
        if handles.is_empty() {
            return Err(HiloError::oracle("Empty decryption batch"));
        }

        {
            let vault = self.vault.read();
            if let Some(missing) = handles.iter().find(|h| !vault.contains_key(*h)) {
                return Err(HiloError::UnknownHandle(missing.to_hex()));
            }
        }

        let id = {
            let mut next = self.next_request_id.lock();
            let id = RequestId(*next);
            *next += 1;
            id
        };

        self.queue.lock().push_back(QueuedRequest {
            id,
            handles: handles.to_vec(),
            requested_at: Utc::now(),
        });

        tracing::debug!("Queued decryption request {} ({} handles)", id, handles.len());
        Ok(id)
    }

    fn verify_decryption(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &DecryptionProof,
    ) -> Result<()> {
        if proof.0 != self.decryption_tag(request_id, cleartexts) {
            return Err(HiloError::InvalidDecryptionProof(request_id));
        }
        Ok(())
    }
}

fn domain_hash(key: &[u8], domain: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
