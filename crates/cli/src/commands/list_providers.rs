//! list-providers command

use aliasman_core::ProviderRegistry;
use serde::Serialize;

use super::{fail, registry};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Debug, Serialize)]
struct ProviderInfo {
    name: &'static str,
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct ProvidersOutput {
    email: Vec<ProviderInfo>,
    storage: Vec<ProviderInfo>,
}

impl ProvidersOutput {
    fn from_registry(registry: &ProviderRegistry) -> Self {
        let mut email: Vec<_> = registry
            .email_factories()
            .map(|f| ProviderInfo {
                name: f.type_name(),
                description: f.description(),
            })
            .collect();
        let mut storage: Vec<_> = registry
            .storage_factories()
            .map(|f| ProviderInfo {
                name: f.type_name(),
                description: f.description(),
            })
            .collect();
        email.sort_by_key(|p| p.name);
        storage.sort_by_key(|p| p.name);
        Self { email, storage }
    }
}

impl std::fmt::Display for ProvidersOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Email providers:\n")?;
        for p in &self.email {
            writeln!(f, "  {:<22}{}", p.name, p.description)?;
        }
        writeln!(f, "\nStorage providers:\n")?;
        for p in &self.storage {
            writeln!(f, "  {:<22}{}", p.name, p.description)?;
        }
        Ok(())
    }
}

pub fn execute(output: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output);
    match registry() {
        Ok(registry) => {
            formatter.output(&ProvidersOutput::from_registry(&registry));
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e, "list-providers"),
    }
}
