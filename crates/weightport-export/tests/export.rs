use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use weightport_core::{
    DType, ExportError, InMemoryProvider, LayerDescriptor, LayerKind, Shape, ShapeViolation,
    Tensor, ALEXNET_LAYERS, METADATA_FILE_NAME,
};
use weightport_export::{
    export_network, metadata_line, synthetic_network, verify_output, CommitMode, Extractor,
    LayerFiles,
};

const TINY_NETWORK: [(&str, &[usize]); 8] = [
    ("conv1", &[96, 3, 11, 11]),
    ("conv2", &[8, 96, 5, 5]),
    ("conv3", &[6, 8, 3, 3]),
    ("conv4", &[4, 6, 3, 3]),
    ("conv5", &[4, 4, 3, 3]),
    ("fc6", &[16, 36]),
    ("fc7", &[16, 16]),
    ("fc8", &[10, 16]),
];

fn tiny_provider() -> InMemoryProvider {
    synthetic_network(&TINY_NETWORK, 42)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn snapshot(dir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        files.push((
            entry.file_name().to_string_lossy().into_owned(),
            read(&entry.path())?,
        ));
    }
    files.sort();
    Ok(files)
}

#[test]
fn exports_every_layer_with_consistent_lengths() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let summary = export_network(&tiny_provider(), dir.path())?;
    ensure!(summary.layers.len() == 8, "expected 8 layers");

    for ((name, dims), layer) in TINY_NETWORK.iter().zip(&summary.layers) {
        assert_eq!(layer.descriptor.name, *name);
        assert_eq!(layer.descriptor.weight_shape.dims(), *dims);

        let files = LayerFiles::new(dir.path(), name);
        let weights = read(&files.weights)?;
        let bias = read(&files.bias)?;
        let combined = read(&files.combined)?;

        let numel: usize = dims.iter().product();
        assert_eq!(weights.len(), 4 * numel, "{name}.bin");
        assert_eq!(bias.len(), 4 * dims[0], "{name}_bias.bin");
        assert_eq!(combined.len(), weights.len() + bias.len());
        assert_eq!(&combined[..weights.len()], weights.as_slice());
        assert_eq!(&combined[weights.len()..], bias.as_slice());
        assert_eq!(layer.written.combined_bytes, combined.len() as u64);
    }

    let checks = verify_output(dir.path())?;
    assert_eq!(checks.len(), 8);
    Ok(())
}

#[test]
fn conv1_scenario_sizes_and_metadata() -> Result<()> {
    let dir = tempfile::tempdir()?;
    export_network(&tiny_provider(), dir.path())?;

    let files = LayerFiles::new(dir.path(), "conv1");
    assert_eq!(fs::metadata(&files.weights)?.len(), 139_392);
    assert_eq!(fs::metadata(&files.bias)?.len(), 384);
    assert_eq!(fs::metadata(&files.combined)?.len(), 139_776);

    let metadata = fs::read_to_string(dir.path().join(METADATA_FILE_NAME))?;
    assert_eq!(metadata.lines().next(), Some("conv1 96 3 11"));
    Ok(())
}

#[test]
fn fc6_scenario_metadata_and_size() {
    let fc6 = LayerDescriptor {
        name: "fc6".to_string(),
        kind: LayerKind::FullyConnected,
        weight_shape: Shape::from_slice(&[4096, 9216]),
    };
    assert_eq!(metadata_line(&fc6), "fc6 4096 9216");
    assert_eq!(fc6.serialized_weight_shape().numel() * 4, 150_994_944);
}

#[test]
fn metadata_has_one_line_per_layer_in_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    export_network(&tiny_provider(), dir.path())?;

    let metadata = fs::read_to_string(dir.path().join(METADATA_FILE_NAME))?;
    let lines: Vec<&str> = metadata.lines().collect();
    assert_eq!(lines.len(), 8);

    for (line, spec) in lines.iter().zip(ALEXNET_LAYERS.iter()) {
        let tokens: Vec<&str> = line.split(' ').collect();
        assert_eq!(tokens[0], spec.name);
        assert_eq!(tokens.len() - 1, spec.kind.metadata_arity(), "{line}");
        assert!(tokens[1..].iter().all(|t| t.parse::<usize>().is_ok()), "{line}");
    }
    assert_eq!(lines[5], "fc6 16 36");
    Ok(())
}

#[test]
fn rerunning_is_byte_identical() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = tiny_provider();

    export_network(&provider, dir.path())?;
    let first = snapshot(dir.path())?;
    export_network(&provider, dir.path())?;
    let second = snapshot(dir.path())?;

    assert_eq!(first.len(), 8 * 3 + 1);
    assert!(first == second, "second run changed the output");
    Ok(())
}

#[test]
fn values_are_little_endian_f32_in_flattened_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut provider = tiny_provider();
    let values: Vec<f32> = (0..4 * 4 * 9).map(|v| v as f32 * 0.5).collect();
    provider.insert(
        "conv5",
        Tensor::from_f32(Shape::from_slice(&[4, 4, 3, 3]), &values),
        Tensor::from_f32(Shape::from_slice(&[4]), &[1.0, -2.0, 3.0, -4.0]),
    );
    export_network(&provider, dir.path())?;

    let combined = read(&LayerFiles::new(dir.path(), "conv5").combined)?;
    let decoded: Vec<f32> = combined
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    assert_eq!(&decoded[..values.len()], values.as_slice());
    assert_eq!(&decoded[values.len()..], &[1.0, -2.0, 3.0, -4.0]);
    Ok(())
}

#[test]
fn rank3_convolution_fails_before_writing_that_layer() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut provider = tiny_provider();
    let values = vec![0.0f32; 6 * 8 * 9];
    provider.insert(
        "conv3",
        Tensor::from_f32(Shape::from_slice(&[6, 8, 9]), &values),
        Tensor::from_f32(Shape::from_slice(&[6]), &[0.0; 6]),
    );

    let err = export_network(&provider, dir.path()).unwrap_err();
    match &err {
        ExportError::Shape { layer, violation } => {
            assert_eq!(layer, "conv3");
            assert!(matches!(violation, ShapeViolation::Rank { expected: 4, .. }));
        }
        other => panic!("expected a shape error, got {other}"),
    }
    assert!(err.to_string().contains("conv3"));

    let conv3 = LayerFiles::new(dir.path(), "conv3");
    assert!(!conv3.weights.exists());
    assert!(!conv3.bias.exists());
    assert!(!conv3.combined.exists());
    assert!(LayerFiles::new(dir.path(), "conv2").combined.exists());
    assert!(!dir.path().join(METADATA_FILE_NAME).exists());
    Ok(())
}

#[test]
fn non_square_kernel_is_a_shape_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut provider = tiny_provider();
    provider.insert(
        "conv1",
        Tensor::from_f32(Shape::from_slice(&[2, 3, 5, 3]), &[0.0; 90]),
        Tensor::from_f32(Shape::from_slice(&[2]), &[0.0; 2]),
    );

    let err = export_network(&provider, dir.path()).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Shape {
            violation: ShapeViolation::NonSquareKernel { height: 5, width: 3 },
            ..
        }
    ));
}

#[test]
fn non_f32_tensors_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut provider = tiny_provider();
    let fc8 = Tensor::from_bytes(
        DType::F16,
        Shape::from_slice(&[10, 16]),
        vec![0u8; 10 * 16 * 2].into(),
    );
    provider.insert("fc8", fc8, Tensor::from_f32(Shape::from_slice(&[10]), &[0.0; 10]));

    let err = export_network(&provider, dir.path()).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Shape {
            violation: ShapeViolation::DType(DType::F16),
            ..
        }
    ));
}

#[test]
fn missing_layer_aborts_without_metadata() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut provider = tiny_provider();
    provider.remove("fc7");

    let err = export_network(&provider, dir.path()).unwrap_err();
    match &err {
        ExportError::Extraction { layer, .. } => assert_eq!(layer, "fc7"),
        other => panic!("expected an extraction error, got {other}"),
    }
    assert!(err.to_string().contains("fc7"));
    assert!(LayerFiles::new(dir.path(), "fc6").weights.exists());
    assert!(!dir.path().join(METADATA_FILE_NAME).exists());
    Ok(())
}

#[test]
fn missing_directory_is_an_io_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("does-not-exist");

    let err = export_network(&tiny_provider(), &missing).unwrap_err();
    match err {
        ExportError::Io { path, .. } => ensure!(path.starts_with(&missing), "wrong path {path:?}"),
        other => panic!("expected an I/O error, got {other}"),
    }
    Ok(())
}

#[test]
fn staged_export_matches_in_place_export() -> Result<()> {
    let root = tempfile::tempdir()?;
    let in_place = root.path().join("in-place");
    let staged = root.path().join("staged");
    fs::create_dir(&in_place)?;
    fs::create_dir(&staged)?;
    let provider = tiny_provider();

    export_network(&provider, &in_place)?;
    let summary = Extractor::new(&provider)
        .with_commit_mode(CommitMode::Staged)
        .run(&staged)?;

    assert_eq!(summary.metadata_path, staged.join(METADATA_FILE_NAME));
    assert!(summary.layers.iter().all(|l| l.files.weights.starts_with(&staged)));
    assert!(snapshot(&in_place)? == snapshot(&staged)?);

    // only the two output directories remain; the staging directory is gone
    assert_eq!(fs::read_dir(root.path())?.count(), 2);
    Ok(())
}

#[test]
fn failed_staged_export_leaves_directory_untouched() -> Result<()> {
    let root = tempfile::tempdir()?;
    let out = root.path().join("weights");
    fs::create_dir(&out)?;
    let provider = tiny_provider();
    export_network(&provider, &out)?;
    let before = snapshot(&out)?;

    let mut broken = synthetic_network(&TINY_NETWORK, 99);
    broken.remove("fc8");
    let err = Extractor::new(&broken)
        .with_commit_mode(CommitMode::Staged)
        .run(&out)
        .unwrap_err();
    assert!(matches!(err, ExportError::Extraction { .. }));

    assert!(before == snapshot(&out)?);
    assert_eq!(fs::read_dir(root.path())?.count(), 1);
    Ok(())
}

#[test]
fn row_major_view_over_longer_buffer_writes_only_its_elements() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut provider = tiny_provider();
    let values: Vec<f32> = (0..8).map(|v| v as f32).collect();
    provider.insert(
        "fc8",
        Tensor::from_f32(Shape::from_slice(&[2, 2]), &values).with_strides(&[2, 1]),
        Tensor::from_f32(Shape::from_slice(&[2]), &[9.0, 10.0]),
    );
    export_network(&provider, dir.path())?;

    let files = LayerFiles::new(dir.path(), "fc8");
    assert_eq!(fs::metadata(&files.weights)?.len(), 16);
    assert_eq!(fs::metadata(&files.combined)?.len(), 24);
    assert_eq!(&read(&files.combined)?[16..], &[9.0f32, 10.0].map(f32::to_le_bytes).concat()[..]);
    verify_output(dir.path())?;
    Ok(())
}

fn verify_error(dir: &Path) -> String {
    match verify_output(dir) {
        Ok(_) => panic!("verification of {} unexpectedly passed", dir.display()),
        Err(err) => format!("{err:#}"),
    }
}

#[test]
fn verify_rejects_truncated_bias_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    export_network(&tiny_provider(), dir.path())?;

    let bias = LayerFiles::new(dir.path(), "conv4").bias;
    let mut bytes = read(&bias)?;
    bytes.truncate(bytes.len() - 4);
    fs::write(&bias, bytes)?;

    let message = verify_error(dir.path());
    assert!(message.contains("conv4_bias.bin"), "{message}");
    Ok(())
}

#[test]
fn verify_rejects_combined_file_with_corrupted_weights() -> Result<()> {
    let dir = tempfile::tempdir()?;
    export_network(&tiny_provider(), dir.path())?;

    let combined = LayerFiles::new(dir.path(), "fc7").combined;
    let mut bytes = read(&combined)?;
    bytes[5] ^= 0x01;
    fs::write(&combined, bytes)?;

    let message = verify_error(dir.path());
    assert!(message.contains("fc7_combined.bin"), "{message}");
    assert!(message.contains("not the weights file"), "{message}");
    Ok(())
}

#[test]
fn verify_rejects_metadata_missing_a_layer() -> Result<()> {
    let dir = tempfile::tempdir()?;
    export_network(&tiny_provider(), dir.path())?;

    let path = dir.path().join(METADATA_FILE_NAME);
    let metadata = fs::read_to_string(&path)?;
    let kept: String = metadata
        .lines()
        .filter(|line| !line.starts_with("fc8 "))
        .map(|line| format!("{line}\n"))
        .collect();
    fs::write(&path, kept)?;

    let message = verify_error(dir.path());
    assert!(message.contains("missing layer fc8"), "{message}");
    Ok(())
}
