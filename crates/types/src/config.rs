// Path: crates/types/src/config.rs
//! Tenant (issuer instance) configuration structures.
//!
//! One [`IssuerInstance`] record defines keys, status-list families, and
//! issuance options for a single tenant. Instances are the unit of
//! multi-tenancy: every HTTP route is scoped by the instance id, and every
//! status-list set is owned by exactly one instance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The semantic label attached to one status bitmap family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPurpose {
    /// The bit permanently revokes the credential when set.
    Revocation,
    /// The bit temporarily suspends the credential when set.
    Suspension,
    /// The bit marks the credential as activated when set.
    Activation,
}

impl StatusPurpose {
    /// The lowercase wire form used in status entries and SLC subjects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revocation => "revocation",
            Self::Suspension => "suspension",
            Self::Activation => "activation",
        }
    }

    /// Parses the lowercase wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "revocation" => Some(Self::Revocation),
            "suspension" => Some(Self::Suspension),
            "activation" => Some(Self::Activation),
            _ => None,
        }
    }
}

impl fmt::Display for StatusPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The status-list family a tenant issues entries against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusListType {
    /// Bitstring Status List v1.0 entries with an explicit SLC URL.
    BitstringStatusList,
    /// Terse entries carrying a base URL and a single flat index.
    TerseBitstringStatusList,
    /// Legacy Status List 2021 entries.
    StatusList2021,
    /// Legacy Revocation List 2020 entries (revocation purpose only).
    RevocationList2020,
}

impl StatusListType {
    /// The `type` value written into a credential's status entry.
    pub fn entry_type(&self) -> &'static str {
        match self {
            Self::BitstringStatusList => "BitstringStatusListEntry",
            Self::TerseBitstringStatusList => "TerseBitstringStatusListEntry",
            Self::StatusList2021 => "StatusList2021Entry",
            Self::RevocationList2020 => "RevocationList2020Status",
        }
    }

    /// The `type` of the published status list credential.
    pub fn credential_type(&self) -> &'static str {
        match self {
            Self::BitstringStatusList | Self::TerseBitstringStatusList => {
                "BitstringStatusListCredential"
            }
            Self::StatusList2021 => "StatusList2021Credential",
            Self::RevocationList2020 => "RevocationList2020Credential",
        }
    }

    /// The `type` of the SLC's credential subject.
    pub fn subject_type(&self) -> &'static str {
        match self {
            Self::BitstringStatusList | Self::TerseBitstringStatusList => "BitstringStatusList",
            Self::StatusList2021 => "StatusList2021",
            Self::RevocationList2020 => "RevocationList2020",
        }
    }

    /// The JSON-LD context that defines this list family's terms, when one
    /// must be added to issued credentials beyond the core VC context.
    pub fn context_url(&self) -> Option<&'static str> {
        match self {
            // Defined by the VC 2.0 core context.
            Self::BitstringStatusList | Self::TerseBitstringStatusList => None,
            Self::StatusList2021 => Some("https://w3id.org/vc/status-list/2021/v1"),
            Self::RevocationList2020 => Some("https://w3id.org/vc-revocation-list-2020/v1"),
        }
    }
}

impl fmt::Display for StatusListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_type())
    }
}

/// Dimensions and identity of one status-list family configured on a tenant.
///
/// `block_size * block_count` is the length of each list in bits;
/// `list_length * list_count` is the maximum capacity of the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListOptions {
    /// The list family to issue entries against.
    #[serde(rename = "type")]
    pub list_type: StatusListType,
    /// The purposes tracked by this family, in declaration order. Each
    /// purpose owns an independent list set.
    pub purposes: Vec<StatusPurpose>,
    /// Bits per block. Must be a power of two.
    #[serde(default = "defaults::block_size")]
    pub block_size: u32,
    /// Blocks per list.
    #[serde(default = "defaults::block_count")]
    pub block_count: u32,
    /// The cap on lists per set; allocation past this fails with
    /// `QuotaExceededError`.
    #[serde(default = "defaults::list_count")]
    pub list_count: u32,
    /// The allocator namespace. Status updates must present the same value
    /// to prove they target the namespace that issued the entry.
    pub index_allocator: String,
}

impl StatusListOptions {
    /// Bits per list.
    pub fn list_length(&self) -> u64 {
        self.block_size as u64 * self.block_count as u64
    }

    /// Maximum positions this family can ever assign.
    pub fn max_capacity(&self) -> u64 {
        self.list_length() * self.list_count as u64
    }

    /// Structural validation applied when an instance is registered.
    pub fn validate(&self) -> Result<(), String> {
        if !self.block_size.is_power_of_two() {
            return Err(format!(
                "blockSize must be a power of two, got {}",
                self.block_size
            ));
        }
        if self.block_count == 0 || self.list_count == 0 {
            return Err("blockCount and listCount must be non-zero".into());
        }
        if self.list_length() > u32::MAX as u64 {
            return Err(format!(
                "list length {} exceeds the addressable maximum",
                self.list_length()
            ));
        }
        if self.purposes.is_empty() {
            return Err("at least one statusPurpose is required".into());
        }
        if self.index_allocator.is_empty() {
            return Err("indexAllocator must be non-empty".into());
        }
        if self.list_type == StatusListType::RevocationList2020
            && self.purposes != [StatusPurpose::Revocation]
        {
            return Err("RevocationList2020 supports only the revocation purpose".into());
        }
        Ok(())
    }
}

mod defaults {
    pub fn block_size() -> u32 {
        32
    }
    pub fn block_count() -> u32 {
        4096
    }
    pub fn list_count() -> u32 {
        1
    }
}

/// The cryptographic suites a tenant may request proofs with.
///
/// The core treats suites as opaque labels handed to the configured signer;
/// which suites a signer actually supports is the signer's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cryptosuite {
    /// Ed25519 2020 data-integrity proofs.
    Ed25519Signature2020,
    /// EdDSA with RDF canonicalization.
    #[serde(rename = "eddsa-rdfc-2022")]
    EddsaRdfc2022,
    /// EdDSA with JCS canonicalization.
    #[serde(rename = "eddsa-jcs-2022")]
    EddsaJcs2022,
    /// ECDSA with RDF canonicalization.
    #[serde(rename = "ecdsa-rdfc-2019")]
    EcdsaRdfc2019,
    /// ECDSA selective disclosure.
    #[serde(rename = "ecdsa-sd-2023")]
    EcdsaSd2023,
    /// ECDSA with external issuance.
    #[serde(rename = "ecdsa-xi-2023")]
    EcdsaXi2023,
    /// BBS selective disclosure.
    #[serde(rename = "bbs-2023")]
    Bbs2023,
}

impl Cryptosuite {
    /// The wire name of the suite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519Signature2020 => "Ed25519Signature2020",
            Self::EddsaRdfc2022 => "eddsa-rdfc-2022",
            Self::EddsaJcs2022 => "eddsa-jcs-2022",
            Self::EcdsaRdfc2019 => "ecdsa-rdfc-2019",
            Self::EcdsaSd2023 => "ecdsa-sd-2023",
            Self::EcdsaXi2023 => "ecdsa-xi-2023",
            Self::Bbs2023 => "bbs-2023",
        }
    }

    /// Whether the suite requires mandatory pointers (selective disclosure).
    pub fn is_selective_disclosure(&self) -> bool {
        matches!(self, Self::EcdsaSd2023 | Self::Bbs2023)
    }
}

/// One requested proof: a suite plus its selective-disclosure pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptosuiteOptions {
    /// The suite name.
    pub name: Cryptosuite,
    /// JSON pointers that must always be disclosed, for selective-disclosure
    /// suites.
    #[serde(default)]
    pub mandatory_pointers: Vec<String>,
}

/// The envelope format for enveloped (non-embedded-proof) issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeFormat {
    /// The credential is carried as a JWT.
    #[serde(rename = "VC-JWT")]
    VcJwt,
}

/// Envelope issuance options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeOptions {
    /// The envelope format.
    pub format: EnvelopeFormat,
    /// The JOSE algorithm, e.g. `EdDSA`.
    pub algorithm: String,
}

/// How the instance signs issued credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueOptions {
    /// Data-integrity suites to attach, in order. A single suite attaches a
    /// proof object; several attach a proof set (array).
    #[serde(default)]
    pub cryptosuites: Vec<CryptosuiteOptions>,
    /// When present, issuance produces an `EnvelopedVerifiableCredential`
    /// instead of embedded proofs.
    #[serde(default)]
    pub envelope: Option<EnvelopeOptions>,
}

/// One tenant of the issuer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerInstance {
    /// The instance (config) id that scopes every HTTP route.
    pub id: String,
    /// The controller identity written as `issuer` into SLCs.
    pub controller: String,
    /// The verification method referenced by generated proofs.
    pub verification_method: String,
    /// Hex-encoded Ed25519 seed for the development signer. Production
    /// deployments point this at an external keystore reference instead.
    pub signing_key_seed: String,
    /// Status-list families, in declaration order. Entry order in issued
    /// credentials follows this order.
    #[serde(default)]
    pub status_lists: Vec<StatusListOptions>,
    /// Proof and envelope configuration.
    pub issue_options: IssueOptions,
    /// Whether credentials without an `id` may be issued under a minted
    /// `urn:uuid:` identifier.
    #[serde(default)]
    pub allow_unidentified: bool,
}

impl IssuerInstance {
    /// Structural validation applied when the instance is registered.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("instance id must be non-empty".into());
        }
        for opts in &self.status_lists {
            opts.validate()?;
        }
        if self.issue_options.cryptosuites.is_empty() && self.issue_options.envelope.is_none() {
            return Err("at least one cryptosuite or an envelope format is required".into());
        }
        Ok(())
    }
}
