//! # vigil-core
//!
//! Verification engine for iOS Simulator UI state.
//!
//! Every assertion snapshots the accessibility tree (or reads the system
//! log), checks a condition, and retries on an interval until it holds or
//! a time budget runs out. Each run produces a [`VerificationResult`] with
//! a status, a message, one record per attempt and a typed payload.
//!
//! ## Modules
//!
//! - [`verifier`] - The [`Verifier`] entry point and its collaborators
//! - [`assertions`] - The assertion catalog: visibility, state, text, screens, logs
//! - [`poll`] - The polling core shared by every assertion
//! - [`result`] - Result, status and assertion type records
//! - [`target`] / [`matcher`] - Element targets and how they resolve against a tree
//! - [`element`] - The accessibility tree model
//! - [`device`] - Collaborator traits for devices, snapshots, screenshots, artifacts and logs
//! - [`simctl`] / [`axe`] - Simulator backends for those traits
//! - [`artifacts`] - Filesystem artifact store
//! - [`step`] - Textual and JSON step definitions
//! - [`config`] - Defaults loaded from `~/.vigil/config.json`
//!
//! ## External Dependencies
//!
//! The simulator backend needs:
//!
//! - **Xcode** (for `xcrun simctl`) - device listing, screenshots, `log show`
//! - **axe** - accessibility hierarchy dumps (`brew install cameroncooke/axe/axe`)
//!
//! ## Example
//!
//! ```no_run
//! use vigil_core::{AssertionOptions, ElementTarget, Verifier, VigilConfig};
//!
//! # async fn run() -> Result<(), vigil_core::VerifyError> {
//! let verifier = Verifier::simulator(VigilConfig::load());
//! let options = AssertionOptions::new("login-flow").with_polling(3000, 250);
//!
//! let result = verifier
//!     .assert_visible(&ElementTarget::by_identifier("login_button"), &options)
//!     .await?;
//! println!("{}: {}", result.status.name(), result.message);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod assertions;
pub mod axe;
pub mod config;
pub mod device;
pub mod element;
pub mod error;
pub mod matcher;
pub mod poll;
pub mod result;
pub mod simctl;
pub mod step;
pub mod target;
pub mod verifier;

pub use assertions::AssertionOptions;
pub use config::VigilConfig;
pub use element::{ElementFrame, UIElement};
pub use error::VerifyError;
pub use result::{AssertionType, VerificationResult, VerificationStatus};
pub use step::{parse_script, Step};
pub use target::ElementTarget;
pub use verifier::{Collaborators, Verifier};
