//! Allow/deny list commands.

use proc_sentinel::policy::{is_default_allowed, DEFAULT_ALLOW};
use proc_sentinel::{PolicyError, SentinelContext};
use serde::Serialize;

use crate::cli::ListAction;
use crate::commands::{render_structured, CmdResult};

/// Which user list a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyList {
    Allow,
    Deny,
}

impl PolicyList {
    fn name(self) -> &'static str {
        match self {
            PolicyList::Allow => "allow",
            PolicyList::Deny => "deny",
        }
    }
}

#[derive(Debug, Serialize)]
struct ListView {
    list: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    defaults: Vec<String>,
    user: Vec<String>,
}

fn report_mutation(result: Result<bool, PolicyError>, done: &str, noop: &str) -> CmdResult {
    match result {
        Ok(true) => {
            println!("✅ {done}");
            Ok(())
        }
        Ok(false) => {
            println!("ℹ️  {noop}");
            Ok(())
        }
        Err(PolicyError::Persistence(e)) => {
            eprintln!("⚠️  {done} for this run only; saving failed: {e}");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

pub fn command_policy(ctx: &SentinelContext, list: PolicyList, action: ListAction) -> CmdResult {
    let policy = &ctx.policy;
    let name = list.name();

    match action {
        ListAction::Add { package } => {
            let package = package.trim().to_string();
            if list == PolicyList::Deny && policy.is_allowed(Some(&package)) {
                println!("⚠️  {package} is allowed; the allow list wins over the deny list");
            }
            let result = match list {
                PolicyList::Allow => policy.add_allow(&package),
                PolicyList::Deny => policy.add_deny(&package),
            };
            report_mutation(
                result,
                &format!("Added {package} to the {name} list"),
                &format!("{package} is already on the {name} list"),
            )
        }

        ListAction::Remove { package } => {
            let package = package.trim().to_string();
            if list == PolicyList::Allow && is_default_allowed(&package) {
                println!("🛡️  {package} is a built-in protected package and stays allowed");
            }
            let result = match list {
                PolicyList::Allow => policy.remove_allow(&package),
                PolicyList::Deny => policy.remove_deny(&package),
            };
            report_mutation(
                result,
                &format!("Removed {package} from the {name} list"),
                &format!("{package} was not on the {name} list"),
            )
        }

        ListAction::List { format } => {
            let view = ListView {
                list: name,
                defaults: match list {
                    PolicyList::Allow => DEFAULT_ALLOW.iter().map(|s| s.to_string()).collect(),
                    PolicyList::Deny => Vec::new(),
                },
                user: match list {
                    PolicyList::Allow => policy.user_allow().into_iter().collect(),
                    PolicyList::Deny => policy.user_deny().into_iter().collect(),
                },
            };

            if let Some(rendered) = render_structured(&view, format)? {
                println!("{rendered}");
                return Ok(());
            }

            println!("📋 {} list ({})", name, policy.store_name());
            for id in &view.defaults {
                println!("   🛡️  {id} (built-in)");
            }
            for id in &view.user {
                println!("   • {id}");
            }
            if view.defaults.is_empty() && view.user.is_empty() {
                println!("   (empty)");
            }
            Ok(())
        }
    }
}
