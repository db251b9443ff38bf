// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Opening a path no grant covers must fail.

use sc_fixtures::FILE;
use tracing::debug;

use super::{ContractFamily, Outcome};
use crate::context::ProbeContext;
use crate::error::{expect_failure, ErrorClass, ProbeError, ProbeResult};

const FAMILY: ContractFamily = ContractFamily::CapabilityAccess;

/// Which refusal is reported depends on the runtime; either is conformant.
pub const ACCEPTED: [ErrorClass; 2] = [ErrorClass::NoEntry, ErrorClass::NotCapable];

pub fn fopen_with_no_access(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let outcome = ctx.preopens().fopen(FILE, "r").map_err(|err| {
        debug!(error = %err, "fopen refused");
        err.class()
    });
    let class = expect_failure(outcome, &ACCEPTED)
        .map_err(|detail| ProbeError::violation(FAMILY, format!("fopen({}): {}", FILE, detail)))?;
    Ok(Outcome::new(format!("fopen({}) refused with {}", FILE, class)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Preopens;

    #[test]
    fn nothing_granted_is_refused() {
        let outcome = fopen_with_no_access(&ProbeContext::default()).unwrap();
        assert!(outcome.summary.contains("no such entry"));
    }

    #[test]
    fn granted_root_is_a_violation() {
        let tree = sc_fixtures::FixtureTree::temporary().unwrap();
        let mut preopens = Preopens::none();
        preopens.grant(tree.base(), sc_fixtures::ROOT).unwrap();

        let err = fopen_with_no_access(&ProbeContext::new(preopens)).unwrap_err();
        assert!(err.is_violation());
        assert!(err.to_string().contains("call succeeded"));
    }
}
