//! Boundary to the encryption/decryption oracle.
//!
//! The game core never decrypts anything itself. It hands ciphertext handles
//! to an [`Oracle`], records the returned request id, and resumes only when a
//! [`DecryptionResponse`](crate::types::DecryptionResponse) comes back with a
//! proof the oracle can vouch for.

pub mod codec;
pub mod local;

pub use codec::Plaintext;
pub use local::LocalOracle;

use crate::error::Result;
use crate::types::{CiphertextHandle, DecryptionProof, Identity, InputProof, RequestId};

pub trait Oracle: Send + Sync {
    /// Accept a ciphertext submitted by `owner`, rejecting handles whose proof
    /// does not bind them to that owner
    fn verify_input(
        &self,
        handle: &CiphertextHandle,
        proof: &InputProof,
        owner: &Identity,
    ) -> Result<()>;

    /// Queue a batch decryption. Cleartexts come back later, in handle order.
    fn request_decryption(&self, handles: &[CiphertextHandle]) -> Result<RequestId>;

    /// Check that `proof` authenticates `cleartexts` as the answer to `request_id`
    fn verify_decryption(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &DecryptionProof,
    ) -> Result<()>;
}
