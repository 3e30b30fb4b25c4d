//! Deterministic account keys derived from a single BIP-39 mnemonic.
//!
//! Keys follow SLIP-0010 ed25519 derivation on the Sui path
//! `m/44'/784'/{index}'/0'/0'`, so account `N` here is the same address a
//! wallet derives for account index `N`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest as _};
use ed25519_dalek::{Signer as _, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::errors::Error;
use crate::types::{AccountIndex, SuiAddress};
use crate::Result;

type HmacSha512 = Hmac<Sha512>;
type Blake2b256 = Blake2b<U32>;

const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";
const HARDENED: u32 = 0x8000_0000;
const SUI_COIN_TYPE_INDEX: u32 = 784;
const ED25519_FLAG: u8 = 0x00;
/// Intent prefix for a Sui transaction: scope, version, app id.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// An extended private key: the ed25519 secret and its chain code.
#[derive(Clone)]
struct ExtendedKey {
    key: [u8; 32],
    chain_code: [u8; 32],
}

impl ExtendedKey {
    fn master(seed: &[u8]) -> Result<Self> {
        Self::from_hmac(ED25519_SEED_KEY, seed)
    }

    /// Ed25519 under SLIP-0010 only supports hardened children.
    fn child(&self, index: u32) -> Result<Self> {
        let mut data = Vec::with_capacity(37);
        data.push(0);
        data.extend_from_slice(&self.key);
        data.extend_from_slice(&(index | HARDENED).to_be_bytes());
        Self::from_hmac(&self.chain_code, &data)
    }

    fn from_hmac(key: &[u8], data: &[u8]) -> Result<Self> {
        let mut mac = HmacSha512::new_from_slice(key)?;
        mac.update(data);
        let out = mac.finalize().into_bytes();

        let mut derived = Self {
            key: [0; 32],
            chain_code: [0; 32],
        };
        derived.key.copy_from_slice(&out[..32]);
        derived.chain_code.copy_from_slice(&out[32..]);
        Ok(derived)
    }
}

fn derive_path(seed: &[u8], path: &[u32]) -> Result<ExtendedKey> {
    path.iter()
        .try_fold(ExtendedKey::master(seed)?, |parent, &index| parent.child(index))
}

fn sui_path(account: AccountIndex) -> [u32; 5] {
    [44, SUI_COIN_TYPE_INDEX, account, 0, 0]
}

/// A signing key plus the address it controls.
pub struct Account {
    signing_key: SigningKey,
    address: SuiAddress,
}

impl Account {
    fn from_secret(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let public = signing_key.verifying_key().to_bytes();

        let mut hasher = Blake2b256::new();
        hasher.update([ED25519_FLAG]);
        hasher.update(public);
        let address = SuiAddress::new(hasher.finalize().into());

        Self {
            signing_key,
            address,
        }
    }

    #[must_use]
    pub fn address(&self) -> SuiAddress {
        self.address
    }

    /// Signs BCS transaction bytes and returns the serialized signature
    /// (`flag || signature || public key`) as base64.
    #[must_use]
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let mut hasher = Blake2b256::new();
        hasher.update(TRANSACTION_INTENT);
        hasher.update(tx_bytes);
        let digest = hasher.finalize();

        let signature = self.signing_key.sign(&digest);

        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        B64.encode(serialized)
    }
}

/// Keys for the funding account and every fleet account, derived up front.
pub struct Keystore {
    accounts: Vec<Account>,
}

impl Keystore {
    /// Derives accounts `0..=fleet_size` from `mnemonic`.
    pub fn from_mnemonic(mnemonic: &str, fleet_size: u32) -> Result<Self> {
        let mnemonic = bip39::Mnemonic::parse_normalized(mnemonic.trim())?;
        let seed = mnemonic.to_seed("");

        let accounts = (0..=fleet_size)
            .map(|index| {
                let extended = derive_path(&seed, &sui_path(index))?;
                Ok(Account::from_secret(&extended.key))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { accounts })
    }

    pub fn account(&self, index: AccountIndex) -> Result<&Account> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.accounts.get(i))
            .ok_or(Error::UnknownAccount(index))
    }

    pub fn address(&self, index: AccountIndex) -> Result<SuiAddress> {
        self.account(index).map(Account::address)
    }

    /// Number of derived accounts, funding account included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}
