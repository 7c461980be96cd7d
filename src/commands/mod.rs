pub mod inspect;
pub mod sort;

use std::collections::BTreeSet;

use anyhow::{Result, bail};

use crate::cli::SenderArgs;
use crate::matcher::StateMatcher;
use crate::states::default_sender_zips;

fn resolve_sender_zips(args: &SenderArgs) -> Result<BTreeSet<String>> {
    let mut zips = if args.no_default_sender_zips {
        BTreeSet::new()
    } else {
        default_sender_zips()
    };

    for zip in &args.sender_zips {
        let zip = zip.trim();
        if zip.len() != 5 || !zip.chars().all(|character| character.is_ascii_digit()) {
            bail!("sender ZIP must be exactly five digits: '{zip}'");
        }
        zips.insert(zip.to_string());
    }

    Ok(zips)
}

fn build_matcher(args: &SenderArgs) -> Result<StateMatcher> {
    StateMatcher::new(resolve_sender_zips(args)?)
}
