use std::path::PathBuf;

use thiserror::Error;

/// ログ解析を打ち切る致命的エラー
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse total files/size from progress lines in {}", path.display())]
    MissingProgress { path: PathBuf },

    #[error("could not parse total time from {} (expected 'Total time: <s>s')", path.display())]
    MissingTotalTime { path: PathBuf },
}
