use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::lottery::RoundOutcome;
use crate::token::{AccountId, Amount};

/// Record of one settled round, good for offline audit: what was staked,
/// who won, which entropy value selected them, and the ledger digest right
/// after settlement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundReceipt {
    pub round: u64,
    pub closed_at: u64,
    pub stakes: u64,
    pub winner: Option<AccountId>,
    pub prize: Amount,
    pub entropy: Option<u64>,
    pub state_digest: [u8; 32],
}

impl RoundReceipt {
    pub fn from_outcome(outcome: &RoundOutcome, state_digest: [u8; 32]) -> Self {
        Self {
            round: outcome.round,
            closed_at: outcome.closed_at,
            stakes: outcome.stakes,
            winner: outcome.winner.clone(),
            prize: outcome.prize,
            entropy: outcome.entropy,
            state_digest,
        }
    }

    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.round.to_le_bytes());
        hasher.update(self.closed_at.to_le_bytes());
        hasher.update(self.stakes.to_le_bytes());
        match &self.winner {
            Some(account) => {
                hasher.update(b"winner");
                hasher.update(account.as_bytes());
            }
            None => hasher.update(b"no-winner"),
        }
        hasher.update(self.prize.to_le_bytes());
        match self.entropy {
            Some(value) => {
                hasher.update(b"entropy");
                hasher.update(value.to_le_bytes());
            }
            None => hasher.update(b"no-entropy"),
        }
        hasher.update(self.state_digest);
        hasher.finalize().into()
    }
}

/// A receipt countersigned by the operator key that closed the round.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedRoundReceipt {
    pub receipt: RoundReceipt,
    #[serde(with = "crate::receipt::serde_bytes")]
    pub operator_key: Vec<u8>,
    #[serde(with = "crate::receipt::serde_bytes")]
    pub signature: Vec<u8>,
}

impl SignedRoundReceipt {
    pub fn sign(receipt: RoundReceipt, key: &SigningKey) -> Self {
        let signature = key.sign(&receipt.digest());
        Self {
            receipt,
            operator_key: key.verifying_key().as_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
        }
    }

    pub fn verify(&self) -> Result<(), ReceiptError> {
        let key_bytes: [u8; 32] = self
            .operator_key
            .as_slice()
            .try_into()
            .map_err(|_| ReceiptError::MalformedKey)?;
        let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| ReceiptError::MalformedKey)?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| ReceiptError::MalformedSignature)?;
        key.verify_strict(&self.receipt.digest(), &signature)
            .map_err(|_| ReceiptError::InvalidSignature)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("operator key is not a valid ed25519 public key")]
    MalformedKey,
    #[error("malformed receipt signature")]
    MalformedSignature,
    #[error("receipt signature does not match the operator key")]
    InvalidSignature,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_receipt() -> RoundReceipt {
        RoundReceipt {
            round: 3,
            closed_at: 1_700_000_000,
            stakes: 5,
            winner: Some("bob".into()),
            prize: 4_000,
            entropy: Some(0xDEAD_BEEF),
            state_digest: [7u8; 32],
        }
    }

    #[test]
    fn signed_receipt_verifies() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let signed = SignedRoundReceipt::sign(sample_receipt(), &key);
        signed.verify().unwrap();
    }

    #[test]
    fn tampered_receipt_is_rejected() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let mut signed = SignedRoundReceipt::sign(sample_receipt(), &key);
        signed.receipt.winner = Some("mallory".into());
        let err = signed.verify().unwrap_err();
        assert!(matches!(err, ReceiptError::InvalidSignature));
    }

    #[test]
    fn foreign_key_is_rejected() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let other = SigningKey::from_bytes(&[43u8; 32]);
        let mut signed = SignedRoundReceipt::sign(sample_receipt(), &key);
        signed.operator_key = other.verifying_key().as_bytes().to_vec();
        let err = signed.verify().unwrap_err();
        assert!(matches!(err, ReceiptError::InvalidSignature));
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let mut signed = SignedRoundReceipt::sign(sample_receipt(), &key);
        signed.signature.truncate(10);
        let err = signed.verify().unwrap_err();
        assert!(matches!(err, ReceiptError::MalformedSignature));
    }

    #[test]
    fn receipt_json_round_trips() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let signed = SignedRoundReceipt::sign(sample_receipt(), &key);
        let encoded = serde_json::to_string(&signed).unwrap();
        let decoded: SignedRoundReceipt = serde_json::from_str(&encoded).unwrap();
        assert_eq!(signed, decoded);
        decoded.verify().unwrap();
    }
}

pub(crate) mod serde_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(D::Error::custom)
    }
}
