//! Controller credential handlers.
//!
//! Credentials live in the store, not the config file, so rotating a
//! client secret never means editing TOML.

use secrecy::SecretString;
use serde::Serialize;
use url::Url;
use vouchly_core::{OmadaCredentials, VoucherStore};

use crate::cli::{CredentialsArgs, CredentialsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// What `credentials show` prints. The secret is never included.
#[derive(Serialize)]
struct CredentialsView {
    url: String,
    omadac_id: String,
    client_id: String,
}

impl From<&OmadaCredentials> for CredentialsView {
    fn from(c: &OmadaCredentials) -> Self {
        Self {
            url: c.base_url.to_string(),
            omadac_id: c.omadac_id.clone(),
            client_id: c.client_id.clone(),
        }
    }
}

fn detail(v: &CredentialsView) -> String {
    output::render_fields(&[
        ("url", v.url.clone()),
        ("omadac_id", v.omadac_id.clone()),
        ("client_id", v.client_id.clone()),
        ("client_secret", "****".into()),
    ])
}

pub async fn handle<S: VoucherStore>(
    store: &S,
    args: CredentialsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CredentialsCommand::Set {
            url,
            omadac_id,
            client_id,
            client_secret,
        } => {
            let creds = build_credentials(url, &omadac_id, &client_id, client_secret)?;
            store.set_omada_credentials(creds).await?;
            if !global.quiet {
                eprintln!("Controller credentials saved");
            }
            Ok(())
        }

        CredentialsCommand::Show => {
            let creds = store
                .get_omada_credentials()
                .await?
                .ok_or(CliError::NoCredentials)?;
            let view = CredentialsView::from(&creds);
            let out = output::render_single(global.output, &view, detail, |v| v.url.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

fn build_credentials(
    base_url: Url,
    omadac_id: &str,
    client_id: &str,
    client_secret: String,
) -> Result<OmadaCredentials, CliError> {
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(CliError::Validation {
            field: "url".into(),
            reason: format!("expected http or https, got {}", base_url.scheme()),
        });
    }
    for (field, value) in [
        ("omadac-id", omadac_id),
        ("client-id", client_id),
        ("client-secret", client_secret.as_str()),
    ] {
        if value.trim().is_empty() {
            return Err(CliError::Validation {
                field: field.into(),
                reason: "must not be empty".into(),
            });
        }
    }

    Ok(OmadaCredentials {
        base_url,
        omadac_id: omadac_id.trim().to_owned(),
        client_id: client_id.trim().to_owned(),
        client_secret: SecretString::from(client_secret),
    })
}
