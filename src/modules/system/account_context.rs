use std::future::Future;

/// Identity of the account a task is currently working for.
#[derive(Debug, Clone, Default)]
pub struct AccountContext {
    pub account_id: String,
    pub template_id: Option<u32>,
}

tokio::task_local! {
    static CURRENT: AccountContext;
}

pub async fn with_account_context<F, T>(ctx: AccountContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT.scope(ctx, fut).await
}

pub fn try_get() -> Option<AccountContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}
