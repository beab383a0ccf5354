use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// 一组待扫描的股票代码（如某个指数的成分股）
///
/// 重复代码允许存在，各自作为独立的拉取单元。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerUniverse {
    pub id: String,
    pub name: String,
    pub tickers: Vec<String>,
}

pub const CUSTOM_UNIVERSE_ID: &str = "CUSTOM";

impl TickerUniverse {
    pub fn new(id: &str, name: &str, tickers: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// 命令行 `--symbols AAPL,MSFT` 构造的临时股票池
    pub fn custom(symbols: &[String]) -> Self {
        Self {
            id: CUSTOM_UNIVERSE_ID.to_string(),
            name: "Custom".to_string(),
            tickers: symbols
                .iter()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// 只读股票池目录：内置指数 + 配置文件中的自定义股票池（同 id 覆盖内置）
#[derive(Debug, Clone)]
pub struct UniverseCatalog {
    universes: Vec<TickerUniverse>,
}

impl UniverseCatalog {
    pub fn builtin() -> Self {
        Self { universes: builtin_universes() }
    }

    pub fn with_overrides(extra: &[TickerUniverse]) -> Self {
        let mut catalog = Self::builtin();
        for u in extra {
            match catalog.universes.iter_mut().find(|b| b.id.eq_ignore_ascii_case(&u.id)) {
                Some(existing) => *existing = u.clone(),
                None => catalog.universes.push(u.clone()),
            }
        }
        catalog
    }

    pub fn all(&self) -> &[TickerUniverse] {
        &self.universes
    }

    /// 按 id 查找（大小写不敏感）
    pub fn find(&self, id: &str) -> Result<&TickerUniverse, ScanError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ScanError::InvalidInput("universe id is empty".to_string()));
        }
        self.universes
            .iter()
            .find(|u| u.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| ScanError::UniverseNotFound(id.to_string()))
    }
}

// 静态成分股列表（上游没有"指数成分"接口，只能维护头部权重股）
fn builtin_universes() -> Vec<TickerUniverse> {
    vec![
        TickerUniverse::new("DAX", "DAX 40 (DE)", &[
            "SAP.DE", "SIE.DE", "ALV.DE", "DTE.DE", "AIR.DE", "MBG.DE", "BMW.DE", "VOW3.DE",
            "BAS.DE", "MUV2.DE", "IFX.DE", "DHL.DE", "DB1.DE", "BEI.DE", "HEN3.DE", "RWE.DE",
            "EOAN.DE", "VNA.DE", "SHL.DE", "ADS.DE", "DBK.DE", "BAYN.DE", "HEI.DE", "SY1.DE",
        ]),
        TickerUniverse::new("SP500", "S&P 500 (US Top)", &[
            "MSFT", "AAPL", "NVDA", "AMZN", "GOOGL", "META", "BRK-B", "LLY", "AVGO", "JPM",
            "TSLA", "XOM", "UNH", "V", "PG", "MA", "JNJ", "HD", "MRK", "COST", "ABBV", "CVX",
            "CRM", "BAC", "AMD", "NFLX", "PEP", "KO", "DIS", "ADBE",
        ]),
        TickerUniverse::new("NASDAQ", "Nasdaq 100 (Tech)", &[
            "MSFT", "AAPL", "NVDA", "AMZN", "AVGO", "META", "TSLA", "GOOGL", "COST", "NFLX",
            "AMD", "ADBE", "PEP", "LIN", "CSCO", "TMUS", "INTC", "QCOM", "TXN", "AMAT",
            "HON", "AMGN", "ISRG", "SBUX", "BKNG", "GILD", "ADP", "MDLZ", "REGN", "VRTX",
        ]),
        TickerUniverse::new("DOW", "Dow Jones (US)", &[
            "UNH", "MSFT", "GS", "HD", "CAT", "AMGN", "MCD", "V", "CRM", "BA",
            "HON", "TRV", "CVX", "AXP", "AAPL", "WMT", "JPM", "IBM", "JNJ", "PG",
            "MRK", "NKE", "DIS", "MMM", "KO", "DOW", "CSCO", "VZ", "INTC", "WBA",
        ]),
        TickerUniverse::new("CAC", "CAC 40 (FR)", &[
            "MC.PA", "OR.PA", "TTE.PA", "SAN.PA", "AIR.PA", "SU.PA", "AI.PA", "BN.PA", "EL.PA",
            "KER.PA", "CS.PA", "BNP.PA", "GLE.PA", "ACA.PA", "ORA.PA", "CAP.PA", "STM.PA", "RI.PA",
        ]),
        TickerUniverse::new("UK100", "FTSE 100 (UK)", &[
            "AZN.L", "SHELL.L", "HSBC.L", "ULVR.L", "BP.L", "RIO.L", "DGE.L", "REL.L", "GSK.L",
            "GLEN.L", "BATS.L", "LSEG.L", "AAL.L", "CNA.L", "NG.L", "LLOY.L", "BARC.L", "VOD.L",
        ]),
    ]
}
