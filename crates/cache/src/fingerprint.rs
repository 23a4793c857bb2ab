use execd_core::{constants::DEFAULT_TIMEOUT_SECS, Commands, ExecutionRequest, Fingerprint};
use sha2::{Digest, Sha256};

/// Hashes every cache-affecting field of `request`, per the fingerprint
/// contract: two requests that differ only in `force` or in
/// execution-time data (duration, ids) hash identically.
pub fn compute_fingerprint(request: &ExecutionRequest) -> Fingerprint {
    let mut hasher = Sha256::new();

    match &request.command {
        Commands::Single(cmd) => {
            feed(&mut hasher, b"single");
            feed(&mut hasher, cmd.as_bytes());
        }
        Commands::Chain(steps) => {
            feed(&mut hasher, b"chain");
            for step in steps {
                feed(&mut hasher, step.cmd.as_bytes());
                feed(&mut hasher, &step.timeout.unwrap_or(-1.0).to_bits().to_le_bytes());
                feed(&mut hasher, &[step.required as u8]);
            }
        }
    }

    // `env` is a `BTreeMap`, already sorted by key.
    for (key, value) in &request.env {
        feed(&mut hasher, key.as_bytes());
        feed(&mut hasher, value.as_bytes());
    }

    // `files` is a `BTreeMap`, already sorted by path. Hash the post-codec,
    // pre-compression bytes so that two payloads encoding to the same
    // content (e.g. differing only in incidental JSON whitespace) collide,
    // while different compression settings over identical content do not
    // affect the fingerprint, matching the "pre-compression" wording.
    for (path, payload) in &request.files {
        feed(&mut hasher, path.as_bytes());
        if let Ok((format, _compression)) = execd_codec::format::parse_path(path) {
            if let Ok(encoded) = execd_codec::format::encode(format, &payload.0, path) {
                feed(&mut hasher, &encoded);
                continue;
            }
        }
        // Malformed payloads still contribute something deterministic so a
        // request that will fail validation doesn't collide with one that
        // won't.
        feed(&mut hasher, b"<unencodable>");
    }

    let stdin = request
        .stdin
        .clone()
        .map(|s| s.into_string())
        .unwrap_or_default();
    feed(&mut hasher, stdin.as_bytes());

    let timeout = request.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
    feed(&mut hasher, &timeout.to_bits().to_le_bytes());

    for pattern in request.track.iter().flatten() {
        feed(&mut hasher, pattern.as_bytes());
    }

    feed(&mut hasher, &[request.continue_on_error as u8]);

    if let Some(env_name) = &request.environment {
        feed(&mut hasher, env_name.as_bytes());
    }

    let digest: [u8; 32] = hasher.finalize().into();
    Fingerprint::from_bytes(digest)
}

/// Feeds a length-prefixed segment into the hasher so that concatenating
/// two adjacent fields can never collide with a different split of the
/// same bytes.
fn feed(hasher: &mut Sha256, segment: &[u8]) {
    hasher.update((segment.len() as u64).to_le_bytes());
    hasher.update(segment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use execd_core::StdinValue;

    fn base_request(cmd: &str) -> ExecutionRequest {
        ExecutionRequest {
            command: Commands::Single(cmd.to_string()),
            env: Default::default(),
            files: Default::default(),
            stdin: None,
            timeout: None,
            track: None,
            continue_on_error: false,
            force: false,
            environment: None,
        }
    }

    #[test]
    fn identical_requests_fingerprint_identically() {
        let a = base_request("echo hi");
        let b = base_request("echo hi");
        assert_eq!(
            compute_fingerprint(&a).to_string(),
            compute_fingerprint(&b).to_string()
        );
    }

    #[test]
    fn different_commands_differ() {
        let a = base_request("echo hi");
        let b = base_request("echo bye");
        assert_ne!(
            compute_fingerprint(&a).to_string(),
            compute_fingerprint(&b).to_string()
        );
    }

    #[test]
    fn force_does_not_affect_fingerprint() {
        let mut a = base_request("echo hi");
        let mut b = base_request("echo hi");
        a.force = true;
        b.force = false;
        assert_eq!(
            compute_fingerprint(&a).to_string(),
            compute_fingerprint(&b).to_string()
        );
    }

    #[test]
    fn stdin_variants_are_hashed_by_final_string() {
        let mut a = base_request("cat");
        let mut b = base_request("cat");
        a.stdin = Some(StdinValue::Single("x\n".to_string()));
        b.stdin = Some(StdinValue::Lines(vec!["x".to_string()]));
        assert_eq!(
            compute_fingerprint(&a).to_string(),
            compute_fingerprint(&b).to_string()
        );
    }
}
