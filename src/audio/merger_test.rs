use super::*;

#[test]
fn test_empty_input_fails_without_output_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("merged.m4a");
    let result = merge_files(&[], &output);
    assert!(matches!(result, Err(MergeError::NoInput)));
    assert!(!output.exists(), "no output file may be left behind");
}

#[test]
fn test_single_input_is_copied_byte_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("chunk_0.m4a");
    std::fs::write(&input, b"only chunk contents").expect("write");
    let output = dir.path().join("merged.m4a");

    merge_files(&[input.clone()], &output).expect("merge");
    assert_eq!(
        std::fs::read(&output).expect("read"),
        std::fs::read(&input).expect("read input")
    );
}

#[test]
fn test_multiple_inputs_concatenate_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut inputs = Vec::new();
    for (i, data) in [b"aaa".as_slice(), b"bb", b"cccc"].iter().enumerate() {
        let path = dir.path().join(format!("chunk_{}.m4a", i));
        std::fs::write(&path, data).expect("write");
        inputs.push(path);
    }
    let output = dir.path().join("merged.m4a");

    merge_files(&inputs, &output).expect("merge");
    assert_eq!(std::fs::read(&output).expect("read"), b"aaabbcccc");
}

#[test]
fn test_missing_and_empty_inputs_are_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = dir.path().join("chunk_0.m4a");
    std::fs::write(&a, b"first").expect("write");
    let missing = dir.path().join("chunk_1.m4a");
    let empty = dir.path().join("chunk_2.m4a");
    std::fs::write(&empty, b"").expect("write");
    let b = dir.path().join("chunk_3.m4a");
    std::fs::write(&b, b"last").expect("write");
    let output = dir.path().join("merged.m4a");

    merge_files(&[a, missing, empty, b], &output).expect("merge");
    assert_eq!(std::fs::read(&output).expect("read"), b"firstlast");
}

#[test]
fn test_all_inputs_empty_fails_without_output_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let empty = dir.path().join("chunk_0.m4a");
    std::fs::write(&empty, b"").expect("write");
    let missing = dir.path().join("chunk_1.m4a");
    let output = dir.path().join("merged.m4a");

    let result = merge_files(&[empty, missing], &output);
    assert!(matches!(result, Err(MergeError::NoInput)));
    assert!(!output.exists(), "an empty merge must not create an output file");
}

#[test]
fn test_single_input_failure_leaves_destination_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("chunk_0.m4a");
    std::fs::write(&input, b"fresh audio").expect("write");
    // The destination path is occupied by a directory, so the final
    // rename cannot succeed
    let output = dir.path().join("merged.m4a");
    std::fs::create_dir(&output).expect("blocker");

    let result = merge_files(&[input], &output);
    assert!(result.is_err());
    assert!(output.is_dir(), "destination must not be clobbered on failure");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "staging file must be cleaned up");
}

#[test]
fn test_no_staging_file_left_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = dir.path().join("chunk_0.m4a");
    let b = dir.path().join("chunk_1.m4a");
    std::fs::write(&a, b"x").expect("write");
    std::fs::write(&b, b"y").expect("write");
    let output = dir.path().join("merged.m4a");

    merge_files(&[a, b], &output).expect("merge");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_duration_estimate_uses_fixed_bitrate() {
    // 16 KiB per second of audio
    assert_eq!(estimate_duration_ms(0), 0);
    assert_eq!(estimate_duration_ms(16 * 1024), 1000);
    assert_eq!(estimate_duration_ms(160 * 1024), 10_000);
}
