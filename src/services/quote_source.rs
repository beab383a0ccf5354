use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::stock::StockRecord;

/// 扫描器只依赖这个接口：给一个代码，返回一条标准化记录或失败
///
/// 上游网关（拉取 + 标准化）和 AI 研究数据源都实现它；测试中用内存 mock 替换。
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError>;
}
