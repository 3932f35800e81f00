//! # Chain Error Classification
//!
//! Single chokepoint mapping the external binary's human-readable stderr
//! text onto the core error taxonomy. Wrapping a CLI means matching opaque
//! error strings; that fragility is contained here so the patterns can
//! track upstream wording changes without touching retry or orchestration
//! logic.
//!
//! Classification is ordered: the sequence-mismatch signature is checked
//! first because it is the only retryable class, and a mixed stderr must
//! resolve to "retryable" rather than a terminal business error.

use crate::error::CoreError;

/// Stderr signature of a stale account nonce on the destination chain
const SEQUENCE_MISMATCH_SIGNATURE: &str = "account sequence mismatch";

const ALREADY_CLAIMED_SIGNATURE: &str = "already been claimed";
const INSUFFICIENT_FUNDS_SIGNATURE: &str = "insufficient funds";
const ACCOUNT_NOT_FOUND_SIGNATURES: &[&str] = &["account not found", "key not found"];
const NO_CLAIMABLE_SIGNATURE: &str = "no claimable accounts";

/// Map a process failure onto a chain-level error where the stderr matches
/// a known signature, otherwise return the original error unchanged.
pub fn classify_process_error(error: CoreError) -> CoreError {
    let CoreError::NonZeroExit {
        exit_code,
        stdout,
        stderr,
    } = error
    else {
        return error;
    };

    // Some builds of the binary report broadcast errors on stdout.
    let combined = format!("{stderr}\n{stdout}");

    match classify_chain_error(&combined) {
        Some(chain_error) => chain_error,
        None => CoreError::NonZeroExit {
            exit_code,
            stdout,
            stderr,
        },
    }
}

/// Match combined process output against the known chain error signatures
pub fn classify_chain_error(output: &str) -> Option<CoreError> {
    let lowered = output.to_lowercase();

    if lowered.contains(SEQUENCE_MISMATCH_SIGNATURE) {
        return Some(CoreError::sequence_mismatch(extract_line(
            output,
            SEQUENCE_MISMATCH_SIGNATURE,
        )));
    }

    if lowered.contains(ALREADY_CLAIMED_SIGNATURE) {
        let line = extract_line(output, ALREADY_CLAIMED_SIGNATURE);
        let (morse, shannon, height) = parse_claim_detail(&line);
        return Some(CoreError::AlreadyClaimed {
            morse_address: morse,
            shannon_address: shannon,
            claim_height: height,
        });
    }

    if lowered.contains(NO_CLAIMABLE_SIGNATURE) {
        return Some(CoreError::NoClaimableAccounts);
    }

    if lowered.contains(INSUFFICIENT_FUNDS_SIGNATURE) {
        return Some(CoreError::InsufficientFunds {
            message: extract_line(output, INSUFFICIENT_FUNDS_SIGNATURE),
        });
    }

    for signature in ACCOUNT_NOT_FOUND_SIGNATURES {
        if lowered.contains(signature) {
            return Some(CoreError::AccountNotFound {
                message: extract_line(output, signature),
            });
        }
    }

    None
}

/// First line containing the signature, for compact error messages
fn extract_line(output: &str, signature: &str) -> String {
    output
        .lines()
        .find(|line| line.to_lowercase().contains(signature))
        .unwrap_or(output)
        .trim()
        .to_string()
}

/// Best-effort extraction from lines shaped like:
/// `morse address "AB12" has already been claimed at height 4242 by shannon address "pokt1xyz"`
///
/// Returns `None` components when the wording does not match; the caller
/// then surfaces the generic already-claimed message.
fn parse_claim_detail(line: &str) -> (Option<String>, Option<String>, Option<u64>) {
    let quoted: Vec<String> = line
        .split('"')
        .skip(1)
        .step_by(2)
        .map(|s| s.to_string())
        .collect();

    let morse = quoted.first().cloned();
    let shannon = quoted.get(1).cloned();

    let height = line
        .to_lowercase()
        .split("at height ")
        .nth(1)
        .and_then(|rest| {
            rest.split(|c: char| !c.is_ascii_digit())
                .next()
                .filter(|digits| !digits.is_empty())
                .and_then(|digits| digits.parse().ok())
        });

    (morse, shannon, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_mismatch_detected() {
        let stderr = "raw_log: account sequence mismatch, expected 5, got 4: incorrect account sequence";
        let classified = classify_chain_error(stderr).expect("must classify");
        assert!(classified.is_retryable());
        assert!(classified.to_string().contains("expected 5, got 4"));
    }

    #[test]
    fn test_sequence_mismatch_wins_over_business_errors() {
        let stderr = "account sequence mismatch while account not found elsewhere";
        let classified = classify_chain_error(stderr).expect("must classify");
        assert!(matches!(classified, CoreError::SequenceMismatch { .. }));
    }

    #[test]
    fn test_already_claimed_with_detail() {
        let stderr = r#"failed to execute message: morse address "AB12CD34" has already been claimed at height 4242 by shannon address "pokt1xyz" :claim rejected"#;
        match classify_chain_error(stderr).expect("must classify") {
            CoreError::AlreadyClaimed {
                morse_address,
                shannon_address,
                claim_height,
            } => {
                assert_eq!(morse_address.as_deref(), Some("AB12CD34"));
                assert_eq!(shannon_address.as_deref(), Some("pokt1xyz"));
                assert_eq!(claim_height, Some(4242));
            }
            other => panic!("unexpected classification: {other}"),
        }
    }

    #[test]
    fn test_already_claimed_without_parseable_detail() {
        let stderr = "this account has already been claimed";
        match classify_chain_error(stderr).expect("must classify") {
            CoreError::AlreadyClaimed {
                morse_address,
                shannon_address,
                claim_height,
            } => {
                assert!(morse_address.is_none());
                assert!(shannon_address.is_none());
                assert!(claim_height.is_none());
            }
            other => panic!("unexpected classification: {other}"),
        }
    }

    #[test]
    fn test_business_errors_are_not_retryable() {
        for stderr in [
            "spendable balance 0upokt is smaller than 100upokt: insufficient funds",
            "rpc error: account not found",
            "Error: key not found",
            "no claimable accounts in input set",
        ] {
            let classified = classify_chain_error(stderr).expect("must classify");
            assert!(!classified.is_retryable(), "{stderr} must not be retryable");
        }
    }

    #[test]
    fn test_unrecognized_stderr_passes_through() {
        assert!(classify_chain_error("panic: unexpected wasm trap").is_none());

        let original = CoreError::NonZeroExit {
            exit_code: 1,
            stdout: String::new(),
            stderr: "some novel failure".to_string(),
        };
        let passed = classify_process_error(original);
        assert!(matches!(passed, CoreError::NonZeroExit { .. }));
    }

    #[test]
    fn test_stdout_is_also_scanned() {
        let error = CoreError::NonZeroExit {
            exit_code: 1,
            stdout: "account sequence mismatch, expected 2, got 1".to_string(),
            stderr: String::new(),
        };
        assert!(classify_process_error(error).is_retryable());
    }

    #[test]
    fn test_spawn_failures_never_reclassified() {
        let error = CoreError::SpawnFailed {
            program: "pocketd".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert!(matches!(
            classify_process_error(error),
            CoreError::SpawnFailed { .. }
        ));
    }
}
