//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **LaunchConfig**: 起動時の設定（環境変数から読み込み）
//! - **Launcher / LauncherBuilder**: 1 payload の起動（claim→start→record）
//! - **PayloadSet**: payload の一括起動（重複排除・状態による振り分け）

pub mod config;
pub mod launcher;
pub mod payload_set;

// 主要な型を再エクスポート
pub use self::config::LaunchConfig;
pub use self::launcher::{BuildError, LaunchError, LaunchOutcome, Launcher, LauncherBuilder};
pub use self::payload_set::{PayloadSet, PayloadSetResults};
