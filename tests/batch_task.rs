// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/batch_task.rs - 批量推理任务测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tempfile::TempDir;
use thiserror::Error;

use shanan_bench::{
  FromUrl,
  input::ImageFolderInput,
  model::{BoundingBox, DetectItem, Detector, DetectorConfig, DetectorWrapper},
  output::{DirectoryRecordOutput, DirectoryRecordOutputError, draw::Draw},
  task::{BatchTask, RunReport, Task, TaskError},
};

#[derive(Error, Debug)]
#[error("mock detector failure")]
struct MockError;

/// 每张图像返回同一个检测结果，记录每次调用的批次大小
#[derive(Default)]
struct FixedDetector {
  calls: Vec<usize>,
  fail: bool,
  drop_last: bool,
}

impl Detector for &mut FixedDetector {
  type Error = MockError;

  fn detect(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<DetectItem>>, Self::Error> {
    if self.fail {
      return Err(MockError);
    }
    self.calls.push(images.len());
    let mut results: Vec<_> = images
      .iter()
      .map(|_| {
        vec![DetectItem {
          class_id: 0,
          score: 0.87,
          rect: BoundingBox::new(5, 5, 10, 10),
        }]
      })
      .collect();
    if self.drop_last {
      results.pop();
    }
    Ok(results)
  }
}

fn nz(n: usize) -> NonZeroUsize {
  NonZeroUsize::new(n).unwrap()
}

fn image_dir(count: usize) -> TempDir {
  let dir = tempfile::tempdir().unwrap();
  for i in 0..count {
    RgbImage::new(32, 32)
      .save(dir.path().join(format!("img{i}.png")))
      .unwrap();
  }
  dir
}

fn run(
  input: &Path,
  output: &Path,
  batch: usize,
  detector: &mut FixedDetector,
) -> anyhow::Result<RunReport> {
  let input = ImageFolderInput::open(input)?;
  let output = DirectoryRecordOutput::new(output, Draw::default())?;
  BatchTask::new(nz(batch)).run_task(input, detector, output)
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
  let mut files: Vec<_> = std::fs::read_dir(dir)
    .unwrap()
    .map(|e| e.unwrap().path())
    .collect();
  files.sort();
  files
}

#[test]
fn three_images_batch_of_one() {
  let input = image_dir(3);
  let output = tempfile::tempdir().unwrap();
  let mut detector = FixedDetector::default();

  let report = run(input.path(), output.path(), 1, &mut detector).unwrap();

  assert_eq!(report.iterations, 3);
  assert_eq!(detector.calls, vec![1, 1, 1]);
  assert_eq!(files_in(output.path()).len(), 6);
  for i in 0..3 {
    let text = std::fs::read_to_string(output.path().join(format!("img{i}.txt"))).unwrap();
    assert_eq!(text, "0 0.870000 5 5 15 15\n");
    assert!(output.path().join(format!("img{i}.png")).is_file());
  }

  let summary = report.summary.unwrap();
  assert_eq!(summary.images, 3);
  assert_eq!(summary.inferences, 3);
}

#[test]
fn iterations_are_ceil_of_images_over_batch() {
  for (images, batch, expected) in [(5, 2, 3), (4, 2, 2), (1, 4, 1), (7, 3, 3)] {
    let input = image_dir(images);
    let output = tempfile::tempdir().unwrap();
    let mut detector = FixedDetector::default();

    let report = run(input.path(), output.path(), batch, &mut detector).unwrap();

    assert_eq!(report.iterations, expected, "{images} images, batch {batch}");
    assert_eq!(detector.calls.iter().sum::<usize>(), images);
    assert!(detector.calls.iter().all(|&n| n <= batch));
    assert_eq!(report.stats.image_count, images);
  }
}

#[test]
fn empty_directory_writes_nothing() {
  let input = image_dir(0);
  let output = tempfile::tempdir().unwrap();
  let mut detector = FixedDetector::default();

  let report = run(input.path(), output.path(), 2, &mut detector).unwrap();

  assert_eq!(report.iterations, 0);
  assert!(detector.calls.is_empty());
  assert!(report.summary.is_none());
  assert!(files_in(output.path()).is_empty());
}

#[test]
fn corrupt_image_truncates_its_batch() {
  let input = image_dir(5);
  std::fs::write(input.path().join("img1.png"), b"corrupt").unwrap();
  let output = tempfile::tempdir().unwrap();
  let mut detector = FixedDetector::default();

  let report = run(input.path(), output.path(), 3, &mut detector).unwrap();

  assert_eq!(detector.calls, vec![1, 3]);
  assert_eq!(report.iterations, 2);
  assert_eq!(report.stats.decode_failures, 1);
  assert!(!output.path().join("img1.txt").exists());
  for i in [0, 2, 3, 4] {
    assert!(output.path().join(format!("img{i}.txt")).is_file());
  }
  assert_eq!(report.summary.unwrap().skipped_images, 1);
}

#[test]
fn rerun_produces_identical_records() {
  let input = image_dir(4);
  let first = tempfile::tempdir().unwrap();
  let second = tempfile::tempdir().unwrap();

  run(input.path(), first.path(), 2, &mut FixedDetector::default()).unwrap();
  run(input.path(), second.path(), 2, &mut FixedDetector::default()).unwrap();
  // 同一目录再跑一次，覆盖已有文件
  run(input.path(), second.path(), 2, &mut FixedDetector::default()).unwrap();

  for i in 0..4 {
    let name = format!("img{i}.txt");
    assert_eq!(
      std::fs::read(first.path().join(&name)).unwrap(),
      std::fs::read(second.path().join(&name)).unwrap()
    );
  }
}

#[test]
fn detector_failure_aborts_the_run() {
  let input = image_dir(2);
  let output = tempfile::tempdir().unwrap();
  let mut detector = FixedDetector {
    fail: true,
    ..Default::default()
  };

  let err = run(input.path(), output.path(), 1, &mut detector).unwrap_err();

  assert!(err.chain().any(|e| e.is::<MockError>()));
  assert!(files_in(output.path()).is_empty());
}

#[test]
fn short_result_is_rejected() {
  let input = image_dir(2);
  let output = tempfile::tempdir().unwrap();
  let mut detector = FixedDetector {
    drop_last: true,
    ..Default::default()
  };

  let err = run(input.path(), output.path(), 2, &mut detector).unwrap_err();

  assert!(matches!(
    err.downcast_ref::<TaskError>(),
    Some(TaskError::ResultCountMismatch {
      batch: 2,
      results: 1
    })
  ));
}

#[test]
fn corrupt_first_image_skips_its_empty_batch() {
  let input = image_dir(3);
  std::fs::write(input.path().join("img0.png"), b"corrupt").unwrap();
  let output = tempfile::tempdir().unwrap();
  let mut detector = FixedDetector::default();

  let report = run(input.path(), output.path(), 1, &mut detector).unwrap();

  assert_eq!(detector.calls, vec![1, 1]);
  assert_eq!(report.iterations, 2);
  assert_eq!(report.stats.decode_failures, 1);
  assert!(!output.path().join("img0.txt").exists());
  assert!(output.path().join("img2.txt").is_file());
}

#[test]
fn writer_failure_aborts_the_run() {
  let input = image_dir(3);
  let output = tempfile::tempdir().unwrap();
  let target = output.path().join("results");
  std::fs::create_dir(&target).unwrap();

  let writer = DirectoryRecordOutput::new(&target, Draw::default()).unwrap();
  // 写出器构造后目录被删除，第一次写出即失败
  std::fs::remove_dir(&target).unwrap();

  let mut detector = FixedDetector::default();
  let err = BatchTask::new(nz(1))
    .run_task(ImageFolderInput::open(input.path()).unwrap(), &mut detector, writer)
    .unwrap_err();

  assert!(err.to_string().contains("写出结果失败"));
  assert!(
    err
      .chain()
      .any(|e| e.downcast_ref::<DirectoryRecordOutputError>().is_some())
  );
  assert_eq!(detector.calls, vec![1]);
  assert!(!target.exists());
}

#[cfg(feature = "replay_detector")]
#[test]
fn replay_backend_end_to_end() {
  let input = image_dir(3);
  let output = tempfile::tempdir().unwrap();
  let recording = tempfile::tempdir().unwrap();
  let recording_path = recording.path().join("recording.json");
  std::fs::write(
    &recording_path,
    r#"[
      [{"class_id": 1, "score": 0.9, "rect": {"x": 1, "y": 2, "width": 3, "height": 4}},
       {"class_id": 1, "score": 0.2, "rect": {"x": 1, "y": 2, "width": 3, "height": 4}}],
      [],
      [{"class_id": 2, "score": 0.75, "rect": {"x": 10, "y": 10, "width": 5, "height": 5}}]
    ]"#,
  )
  .unwrap();

  let url = url::Url::parse(&format!(
    "replay://{}?net=yolov5&precision=fp16&thresh=0.5&nms=0.3&batch=2",
    recording_path.display()
  ))
  .unwrap();
  let config = DetectorConfig::from_url(&url).unwrap();
  let model = DetectorWrapper::from_config(&config).unwrap();

  let report = BatchTask::new(config.batch_size)
    .run_task(
      ImageFolderInput::open(input.path()).unwrap(),
      model,
      DirectoryRecordOutput::new(output.path(), Draw::default()).unwrap(),
    )
    .unwrap();

  assert_eq!(report.iterations, 2);
  let read = |name: &str| std::fs::read_to_string(output.path().join(name)).unwrap();
  assert_eq!(read("img0.txt"), "1 0.900000 1 2 4 6\n");
  assert_eq!(read("img1.txt"), "");
  assert_eq!(read("img2.txt"), "2 0.750000 10 10 15 15\n");
}
