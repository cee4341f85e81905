use std::path::{Path, PathBuf};
use std::sync::Arc;

use range_transfer::config::{Config, Timings};
use range_transfer::error::TransferError;
use range_transfer::infrastructure::{
    BindingStrategy, EngineKind, MemoryDriver, SheetVisibility, Workbook,
};
use range_transfer::models::{
    save_region_config, RegionConfig, RegionMapping, TransferResult, TransferStage,
};
use range_transfer::orchestrator::{App, CancelFlag, RangeTransferOrchestrator};
use range_transfer::utils::logging;
use tempfile::TempDir;

fn test_config() -> Config {
    Config {
        timings: Timings::immediate(),
        ..Config::default()
    }
}

fn mapping(sheet: &str, range: &str, prefix: &str) -> RegionMapping {
    RegionMapping::new(sheet, range, prefix, "测试")
}

/// `#1`、`#2` 两个后缀都使用 `{S1, B1:C2, A}`
fn scenario_config() -> RegionConfig {
    RegionConfig::new()
        .with_set("#1", vec![mapping("S1", "B1:C2", "A")])
        .with_set("#2", vec![mapping("S1", "B1:C2", "A")])
}

struct Workspace {
    dir: TempDir,
    driver: MemoryDriver,
}

impl Workspace {
    fn new() -> Self {
        logging::init_test();
        Self {
            dir: tempfile::tempdir().expect("创建临时目录失败"),
            driver: MemoryDriver::new(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn template(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, text).expect("写入模板失败");
        path
    }

    fn workbook(&self, name: &str, workbook: Workbook) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, "").expect("写入表格文件失败");
        self.driver.add_workbook(path.clone(), workbook);
        path
    }

    fn orchestrator(&self) -> RangeTransferOrchestrator {
        RangeTransferOrchestrator::new(Arc::new(self.driver.clone()), &test_config())
    }

    async fn run(
        &self,
        data_files: &[PathBuf],
        templates: &[PathBuf],
        config: &RegionConfig,
    ) -> TransferResult {
        self.orchestrator()
            .run(data_files, templates, &[], config)
            .await
            .expect("批处理不应失败")
    }

    fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).expect("读取输出文件失败")
    }
}

fn assert_reconciles(result: &TransferResult, attempted: usize) {
    assert_eq!(result.inserted_count + result.failed_count, attempted);
    assert_eq!(result.failed_count, result.failed_items.len());
}

#[tokio::test]
async fn test_two_data_files_fill_their_markers() {
    let ws = Workspace::new();
    let data = vec![
        ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1")),
        ws.workbook("proj_#2.xlsx", Workbook::new().sheet("S1")),
    ];
    let template = ws.template("report.docx", "标题\nA_#1\n正文\nA_#2\n");

    let result = ws.run(&data, &[template.clone()], &scenario_config()).await;

    assert!(result.success);
    assert_eq!(result.inserted_count, 2);
    assert_eq!(result.failed_count, 0);
    assert_eq!(result.output_files, vec![ws.path("report_copy.docx")]);
    assert_reconciles(&result, 2);

    let output = ws.read(&result.output_files[0]);
    assert_eq!(output.matches("[image S1!B1:C2").count(), 2);
    assert!(!output.contains("A_#"));
    // 原模板不变
    assert_eq!(ws.read(&template), "标题\nA_#1\n正文\nA_#2\n");
}

#[tokio::test]
async fn test_missing_sheet_fails_only_its_mapping() {
    let ws = Workspace::new();
    let data = vec![
        ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1")),
        ws.workbook("proj_#2.xlsx", Workbook::new().sheet("Other")),
    ];
    let template = ws.template("report.docx", "A_#1\nA_#2\n");

    let result = ws.run(&data, &[template], &scenario_config()).await;

    assert_eq!(result.inserted_count, 1);
    assert_eq!(result.failed_count, 1);
    let failed = &result.failed_items[0];
    assert_eq!(failed.marker, "A_#2");
    assert_eq!(failed.stage, TransferStage::Capture);
    assert_eq!(failed.data_file, "proj_#2.xlsx");
    assert_eq!(failed.template_file, "report_copy.docx");
    assert!(failed.reason.contains("复制失败"));

    // 未消费的标记保留在文档中
    assert!(ws.read(&result.output_files[0]).contains("A_#2"));
}

#[tokio::test]
async fn test_hidden_sheet_counts_as_capture_failure() {
    let ws = Workspace::new();
    let data = vec![ws.workbook(
        "proj_#1.xlsx",
        Workbook::new().with_sheet("S1", SheetVisibility::VeryHidden),
    )];
    let template = ws.template("report.docx", "A_#1");

    let result = ws.run(&data, &[template], &scenario_config()).await;

    assert_eq!(result.inserted_count, 0);
    assert_eq!(result.failed_items[0].stage, TransferStage::Capture);
}

#[tokio::test]
async fn test_absent_marker_is_reported() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];
    let template = ws.template("report.docx", "这里没有标记");

    let result = ws.run(&data, &[template], &scenario_config()).await;

    assert_eq!(result.inserted_count, 0);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.failed_items[0].marker, "A_#1");
    assert_eq!(result.failed_items[0].stage, TransferStage::Locate);
    assert!(result.failed_items[0].reason.contains("找不到标记"));
}

#[tokio::test]
async fn test_repeated_marker_consumed_in_document_order() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];
    let template = ws.template("report.docx", "A_#1\nA_#1\nA_#1\n");
    let config = RegionConfig::new().with_set(
        "#1",
        vec![mapping("S1", "B1:C2", "A"), mapping("S1", "D1:E4", "A")],
    );

    let result = ws.run(&data, &[template], &config).await;

    assert_eq!(result.inserted_count, 2);
    let output = ws.read(&result.output_files[0]);
    let first = output.find("S1!B1:C2").unwrap();
    let second = output.find("S1!D1:E4").unwrap();
    let remaining = output.find("A_#1").unwrap();
    assert!(first < second && second < remaining);
    assert_eq!(output.matches("A_#1").count(), 1);
}

#[tokio::test]
async fn test_more_mappings_than_markers_fail_after_exhaustion() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];
    let template = ws.template("report.docx", "A_#1 A_#1");
    let config = RegionConfig::new().with_set(
        "#1",
        vec![
            mapping("S1", "A1", "A"),
            mapping("S1", "B1", "A"),
            mapping("S1", "C1", "A"),
        ],
    );

    let result = ws.run(&data, &[template], &config).await;

    assert_eq!(result.inserted_count, 2);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.failed_items[0].range, "C1");
    assert_eq!(result.failed_items[0].stage, TransferStage::Locate);
    assert_reconciles(&result, 3);
}

#[tokio::test]
async fn test_image_height_never_exceeds_available_space() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];
    // 第 10 行（偏移 72 + 9×15 = 207pt）
    let template = ws.template("report.docx", &format!("{}A_#1", "\n".repeat(9)));
    let config = RegionConfig::new().with_set("#1", vec![mapping("S1", "A1:B200", "A")]);

    let result = ws.run(&data, &[template], &config).await;
    assert_eq!(result.inserted_count, 1);

    let output = ws.read(&result.output_files[0]);
    let size = output
        .split_whitespace()
        .find(|part| part.ends_with("pt]"))
        .unwrap()
        .trim_end_matches("pt]");
    let (width, height) = size.split_once('x').unwrap();
    let (width, height): (f64, f64) = (width.parse().unwrap(), height.parse().unwrap());

    let available = (841.89 - 72.0 - 207.0 - 14.0) * 0.9;
    assert!(height <= available + 0.05);
    // 原始 96x3000pt，宽高比保持
    assert!((height / width - 3000.0 / 96.0).abs() < 0.5);
}

#[tokio::test]
async fn test_repeated_runs_are_deterministic() {
    let ws = Workspace::new();
    let data = vec![
        ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1")),
        ws.workbook("proj_#2.xlsx", Workbook::new().sheet("Other")),
        ws.workbook("notes.xlsx", Workbook::new().sheet("S1")),
    ];
    let template = ws.template("report.docx", "A_#1\nA_#2\n");
    let config = scenario_config();

    let first = ws.run(&data, &[template.clone()], &config).await;
    let second = ws.run(&data, &[template], &config).await;

    assert_eq!(first.inserted_count, second.inserted_count);
    assert_eq!(first.failed_count, second.failed_count);
    assert_eq!(first.output_files, vec![ws.path("report_copy.docx")]);
    assert_eq!(second.output_files, vec![ws.path("report_copy1.docx")]);
    // 没有后缀的表格文件只产生警告
    assert_eq!(first.warnings.len(), 1);
    assert_reconciles(&first, 2);
}

#[tokio::test]
async fn test_spreadsheet_handle_exhaustion_fails_that_data_file() {
    let ws = Workspace::new();
    let data = vec![
        ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1")),
        ws.workbook("proj_#2.xlsx", Workbook::new().sheet("S1")),
    ];
    let template = ws.template("report.docx", "A_#1\nA_#2\n");
    ws.driver.fail_launches(EngineKind::Spreadsheet, 3);

    let result = ws.run(&data, &[template], &scenario_config()).await;

    assert_eq!(result.inserted_count, 1);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.failed_items[0].marker, "A_#1");
    assert_eq!(result.failed_items[0].stage, TransferStage::Open);

    let sheet_launches: Vec<BindingStrategy> = ws
        .driver
        .stats()
        .launches
        .into_iter()
        .filter(|(kind, _)| *kind == EngineKind::Spreadsheet)
        .map(|(_, strategy)| strategy)
        .collect();
    assert_eq!(
        sheet_launches,
        vec![
            BindingStrategy::Preferred,
            BindingStrategy::Permissive,
            BindingStrategy::Permissive,
            BindingStrategy::Preferred,
        ]
    );
}

#[tokio::test]
async fn test_document_failure_skips_template_but_batch_continues() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];
    let templates = vec![
        ws.template("first.docx", "A_#1"),
        ws.template("second.docx", "A_#1"),
    ];
    ws.driver.fail_launches(EngineKind::Document, 3);

    let result = ws.run(&data, &templates, &scenario_config()).await;

    assert_eq!(result.skipped_templates.len(), 1);
    assert_eq!(result.skipped_templates[0].template_file, "first_copy.docx");
    assert_eq!(result.inserted_count, 1);
    assert_eq!(result.output_files.len(), 2);
    assert_eq!(ws.driver.stats().terminations, 0);
}

#[tokio::test]
async fn test_save_failure_is_a_warning() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];
    let template = ws.template("report.docx", "A_#1");
    ws.driver.fail_saves(true);

    let result = ws.run(&data, &[template], &scenario_config()).await;

    assert!(result.success);
    assert_eq!(result.inserted_count, 1);
    assert_eq!(result.failed_count, 0);
    assert_eq!(result.warnings.len(), 1);
}

#[tokio::test]
async fn test_no_working_copies_is_fatal() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];

    let err = ws
        .orchestrator()
        .run(&data, &[ws.path("missing.docx")], &[], &scenario_config())
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::NoWorkingCopies));
}

#[tokio::test]
async fn test_cancel_before_start_processes_nothing() {
    let ws = Workspace::new();
    let data = vec![ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"))];
    let template = ws.template("report.docx", "A_#1");
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = ws
        .orchestrator()
        .with_cancel(cancel)
        .run(&data, &[template], &[], &scenario_config())
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.attempted_count(), 0);
    assert!(ws.driver.stats().launches.is_empty());
}

#[tokio::test]
async fn test_cancel_mid_template_still_saves_and_closes() {
    let ws = Workspace::new();
    let data = vec![
        ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1")),
        ws.workbook("proj_#2.xlsx", Workbook::new().sheet("S1")),
    ];
    let templates = vec![
        ws.template("report.docx", "A_#1\nB_#1\nA_#2\nB_#2\n"),
        ws.template("summary.docx", "A_#1\n"),
    ];
    let mappings = vec![mapping("S1", "B1:C2", "A"), mapping("S1", "D1:E2", "B")];
    let config = RegionConfig::new()
        .with_set("#1", mappings.clone())
        .with_set("#2", mappings);

    // 第一次粘贴时请求取消，当前映射仍然完成
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    ws.driver.on_paste(move |count| {
        if count == 1 {
            trigger.cancel();
        }
    });

    let result = ws
        .orchestrator()
        .with_cancel(cancel)
        .run(&data, &templates, &[], &config)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.inserted_count, 1);
    assert_eq!(result.failed_count, 0);
    assert_reconciles(&result, 1);

    let stats = ws.driver.stats();
    // 只打开了第一个模板和第一个表格文件
    assert_eq!(stats.launches.len(), 2);
    assert_eq!(stats.pastes, 1);
    assert_eq!(stats.saves, 1);
    assert_eq!(stats.quits, 2);
    assert_eq!(stats.terminations, 0);

    let output = ws.read(&ws.path("report_copy.docx"));
    assert_eq!(output.matches("[image S1!B1:C2").count(), 1);
    assert!(output.contains("B_#1"));
    assert!(output.contains("A_#2"));
    assert_eq!(ws.read(&ws.path("summary_copy.docx")), "A_#1\n");
}

#[tokio::test]
async fn test_app_run_writes_report_and_log() {
    let ws = Workspace::new();
    let data = ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"));
    let template = ws.template("report.docx", "A_#1");
    let range_config_file = ws.path("range_config.toml");
    save_region_config(&scenario_config(), &range_config_file)
        .await
        .unwrap();

    let config = Config {
        data_files: vec![data],
        template_files: vec![template],
        range_config_file,
        report_file: ws.path("transfer_report.json"),
        output_log_file: ws.path("output.txt"),
        ..test_config()
    };
    let app = App::with_driver(config, Arc::new(ws.driver.clone()));

    let result = app.run().await.unwrap();
    assert_eq!(result.inserted_count, 1);

    let report: serde_json::Value =
        serde_json::from_str(&ws.read(&ws.path("transfer_report.json"))).unwrap();
    assert_eq!(report["inserted_count"], 1);
    assert!(ws.read(&ws.path("output.txt")).contains("report_copy.docx"));
}

#[tokio::test]
async fn test_app_spawn_streams_progress() {
    let ws = Workspace::new();
    let data = ws.workbook("proj_#1.xlsx", Workbook::new().sheet("S1"));
    let template = ws.template("report.docx", "A_#1");
    let config = Config {
        data_files: vec![data],
        template_files: vec![template],
        range_config_file: ws.path("range_config.toml"),
        ..test_config()
    };
    let app = App::with_driver(config, Arc::new(ws.driver.clone()));

    // 配置文件不存在时写入默认配置
    let plan = app.prepare().await.unwrap();
    assert!(ws.path("range_config.toml").exists());

    let mut handle = app.spawn(plan);
    let mut lines = Vec::new();
    while let Some(line) = handle.progress.recv().await {
        lines.push(line);
    }
    let result = handle.join().await;

    assert!(result.success);
    assert!(lines.iter().any(|line| line.contains("文档文件处理")));
    // 默认配置中没有 `A` 标记，全部失败但仍然对账
    assert_eq!(result.inserted_count, 0);
    assert!(result.failed_count > 0);
}

#[tokio::test]
async fn test_app_refuses_missing_inputs() {
    let ws = Workspace::new();
    let config = Config {
        data_files: vec![ws.path("proj_#1.xlsx")],
        template_files: vec![ws.path("report.docx")],
        ..test_config()
    };
    let app = App::with_driver(config, Arc::new(ws.driver.clone()));

    assert!(app.run().await.is_err());
    assert!(ws.driver.stats().launches.is_empty());
}
