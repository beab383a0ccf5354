use std::fmt::Display;
use std::future::Future;

/// 按顺序尝试每个策略，首个成功即返回。
/// 每个策略最多执行一次（不做同策略重试）；全部失败时按尝试顺序返回所有错误。
///
/// # Arguments
/// * `strategies` - 有序策略列表
/// * `attempt` - 对单个策略发起一次尝试的异步闭包
pub async fn try_in_order<'a, S, T, E, F, Fut>(
    strategies: &'a [S],
    mut attempt: F,
) -> Result<T, Vec<E>>
where
    F: FnMut(&'a S) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut failures = Vec::with_capacity(strategies.len());

    for (idx, strategy) in strategies.iter().enumerate() {
        match attempt(strategy).await {
            Ok(val) => {
                if idx > 0 {
                    log::debug!("第 {} 个策略成功（前 {} 个失败）", idx + 1, idx);
                }
                return Ok(val);
            }
            Err(e) => {
                log::debug!("策略 {}/{} 失败: {}", idx + 1, strategies.len(), e);
                failures.push(e);
            }
        }
    }

    Err(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let calls = AtomicUsize::new(0);
        let strategies = ["a", "b", "c"];
        let result: Result<&str, Vec<String>> = try_in_order(&strategies, |s| {
            calls.fetch_add(1, Ordering::SeqCst);
            let s = *s;
            async move {
                if s == "b" { Ok(s) } else { Err(format!("{} down", s)) }
            }
        })
        .await;
        assert_eq!(result, Ok("b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_collects_every_failure_in_order() {
        let strategies = [1, 2, 3];
        let result: Result<(), Vec<String>> =
            try_in_order(&strategies, |n| async move { Err(format!("#{}", n)) }).await;
        assert_eq!(result, Err(vec!["#1".to_string(), "#2".to_string(), "#3".to_string()]));
    }

    #[tokio::test]
    async fn test_empty_list_is_exhausted_immediately() {
        let strategies: [u8; 0] = [];
        let result: Result<(), Vec<String>> = try_in_order(&strategies, |_| async { Ok(()) }).await;
        assert_eq!(result, Err(vec![]));
    }
}
