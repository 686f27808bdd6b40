use anyhow::{Context, Result};
use tracing::info;

use crate::credentials::{self, Credential, SecretStore, TokenPrompt};
use crate::packer::PackOutcome;
use crate::registry::{PublishReceipt, PublishRequest, RegistryClient, RegistryProfile};

/// Builds the upload request from a freshly packed archive.
pub fn request_from_pack(outcome: &PackOutcome) -> PublishRequest {
    let project = &outcome.project;
    PublishRequest {
        name: project.package.name.clone(),
        version: project.version.to_string(),
        scope: project.package.scope.clone(),
        integrity: outcome.integrity.clone(),
        archive: outcome.bytes.clone(),
        readme: project.readme_text(),
        metadata: project.raw.clone(),
    }
}

/// Picks the publishing identity: profile token first, then the keychain.
pub fn credential_for(
    outcome: &PackOutcome,
    profile: &RegistryProfile,
    store: &dyn SecretStore,
    prompt: &dyn TokenPrompt,
) -> Result<Credential> {
    let user = match &profile.user {
        Some(user) => user.clone(),
        None => outcome.project.publisher_email()?,
    };
    if let Some(token) = &profile.token {
        return Ok(Credential {
            user,
            token: token.clone(),
        });
    }
    credentials::resolve(store, prompt, &user)
}

pub fn publish(
    outcome: &PackOutcome,
    profile: &RegistryProfile,
    store: &dyn SecretStore,
    prompt: &dyn TokenPrompt,
) -> Result<PublishReceipt> {
    let credential = credential_for(outcome, profile, store, prompt)?;
    let request = request_from_pack(outcome);
    let client = RegistryClient::from_profile(profile)?;

    info!(
        registry = %profile.name,
        url = %client.upload_url(),
        user = %credential.user,
        "publishing"
    );
    let receipt = client
        .publish(&request, &credential)
        .with_context(|| {
            format!(
                "failed to publish {} to {}",
                outcome.path.display(),
                client.upload_url()
            )
        })?;

    println!("statusCode: {}", receipt.status.as_u16());
    if !receipt.body.is_empty() {
        println!("{}", String::from_utf8_lossy(&receipt.body));
    }
    println!(
        "✓ Published {}@{} to {}",
        outcome.manifest.name, outcome.manifest.version, profile.url
    );
    Ok(receipt)
}

/// Prints what would be uploaded without contacting the registry.
pub fn describe(outcome: &PackOutcome, profile: &RegistryProfile) -> Result<()> {
    let request = request_from_pack(outcome);
    let client = RegistryClient::from_profile(profile)?;
    println!("Dry run: would POST {}", client.upload_url());
    for (key, value) in request.text_fields() {
        if key == "read_me" {
            println!("  {key} = <{} bytes>", value.len());
        } else {
            println!("  {key} = {value}");
        }
    }
    println!(
        "  tgz_file = {} ({} bytes)",
        request.upload_file_name(),
        request.archive.len()
    );
    Ok(())
}
