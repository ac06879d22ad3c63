//! # Constants
//!
//! Shared constants used throughout the sealer and reconciler.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default name of the SealedSecrets controller service
pub const DEFAULT_CONTROLLER_NAME: &str = "sealed-secrets-controller";

/// Default namespace of the SealedSecrets controller service
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "kube-system";

/// Path of the certificate endpoint behind the service proxy
pub const CERTIFICATE_PATH: &str = "/v1/cert.pem";

/// Accept header sent when fetching the certificate
pub const CERTIFICATE_ACCEPT: &str = "application/x-pem-file, */*";

/// Default apply retry count (0 means a single attempt)
pub const DEFAULT_APPLY_RETRY_COUNT: u32 = 0;

/// Initial wait before the first apply retry (milliseconds)
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 3_000;

/// Upper bound on the wait between apply retries (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Growth factor between consecutive apply retries
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Timeout applied to each individual network call (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "sealed-secret-reconciler";

/// API group of the SealedSecret resource
pub const SEALED_SECRET_GROUP: &str = "bitnami.com";

/// API version of the SealedSecret resource
pub const SEALED_SECRET_VERSION: &str = "v1alpha1";

/// Plural resource name of the SealedSecret resource
pub const SEALED_SECRET_PLURAL: &str = "sealedsecrets";

/// Annotation marking a sealed secret as decryptable in any namespace
pub const CLUSTER_WIDE_ANNOTATION: &str = "sealedsecrets.bitnami.com/cluster-wide";

/// Annotation marking a sealed secret as decryptable under any name in its namespace
pub const NAMESPACE_WIDE_ANNOTATION: &str = "sealedsecrets.bitnami.com/namespace-wide";

/// Client-side apply bookkeeping annotation, never sealed
pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Size of the per-value AES-256 session key in bytes
pub const SESSION_KEY_BYTES: usize = 32;

