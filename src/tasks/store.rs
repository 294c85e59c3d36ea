use super::client::TaskClient;
use super::filters::TaskFilters;
use super::model::{TaskDetail, TaskLog, TaskStats, TaskSummary};
use crate::session::dto::{Page, PageWindow, PaginationMeta};
use crate::session::{ActionFailure, ActionResult};
use chrono::{DateTime, Utc};
use log::{info, warn};

pub const MSG_FETCH_TASKS: &str = "获取任务列表失败";
pub const MSG_FETCH_DETAILS: &str = "获取任务详情失败";
pub const MSG_FETCH_LOGS: &str = "获取任务日志失败";
pub const MSG_FETCH_STEPS: &str = "获取任务步骤失败";
pub const MSG_RETRY: &str = "重试任务失败";
pub const MSG_CANCEL: &str = "取消任务失败";
pub const MSG_DELETE: &str = "删除任务失败";
pub const MSG_FETCH_STATS: &str = "获取任务统计失败";

const LOG_PAGE_LIMIT: u64 = 100;

/// 任务列表 / 详情 / 统计的客户端状态
///
/// 动作不做乐观更新：重试、取消、删除成功后重新拉取列表（以及已打开的详情）。
#[derive(Debug)]
pub struct TaskStore {
    client: TaskClient,
    pub tasks: Vec<TaskSummary>,
    pub pagination: PaginationMeta,
    pub filters: TaskFilters,
    pub window: PageWindow,
    pub current: Option<TaskDetail>,
    pub logs: Vec<TaskLog>,
    pub log_level: Option<String>,
    pub stats: Option<TaskStats>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl TaskStore {
    pub fn new(client: TaskClient, page_size: u64) -> Self {
        Self {
            client,
            tasks: Vec::new(),
            pagination: PaginationMeta::default(),
            filters: TaskFilters::default(),
            window: PageWindow::new(page_size),
            current: None,
            logs: Vec::new(),
            log_level: None,
            stats: None,
            last_refreshed: None,
        }
    }

    pub async fn fetch_tasks(&mut self) -> ActionResult<Page<TaskSummary>> {
        let page = self
            .client
            .list(&self.filters, self.window)
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_TASKS, e))?;
        info!(
            "任务列表: {} 条 (第 {}/{} 页, 共 {})",
            page.items.len(),
            page.pagination.page,
            page.pagination.pages,
            page.pagination.total
        );
        self.tasks = page.items.clone();
        self.pagination = page.pagination.clone();
        self.last_refreshed = Some(Utc::now());
        Ok(page)
    }

    /// 替换过滤条件并回到第一页
    pub async fn set_filters(&mut self, filters: TaskFilters) -> ActionResult<Page<TaskSummary>> {
        self.filters = filters;
        self.window.skip = 0;
        self.fetch_tasks().await
    }

    /// 重置全部过滤字段，从 skip=0 拉取一次
    pub async fn clear_filters(&mut self) -> ActionResult<Page<TaskSummary>> {
        self.filters = TaskFilters::default();
        self.window.skip = 0;
        self.fetch_tasks().await
    }

    /// 页码超出服务端总页数时停在末页
    pub async fn set_page(&mut self, page: u64) -> ActionResult<Page<TaskSummary>> {
        let page = page.clamp(1, self.pagination.pages.max(1));
        if let Some(w) = self.window.at_page(page) {
            self.window = w;
        }
        self.fetch_tasks().await
    }

    /// 已是末页时不发请求，返回 None
    pub async fn next_page(&mut self) -> ActionResult<Option<Page<TaskSummary>>> {
        match self.window.next(&self.pagination) {
            Some(w) => {
                self.window = w;
                self.fetch_tasks().await.map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn prev_page(&mut self) -> ActionResult<Option<Page<TaskSummary>>> {
        match self.window.prev(&self.pagination) {
            Some(w) => {
                self.window = w;
                self.fetch_tasks().await.map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn set_limit(&mut self, limit: u64) -> ActionResult<Page<TaskSummary>> {
        self.window = PageWindow::new(limit);
        self.fetch_tasks().await
    }

    pub async fn fetch_task_details(&mut self, task_id: &str) -> ActionResult<TaskDetail> {
        let detail = self
            .client
            .get_details(task_id)
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_DETAILS, e))?;
        if self.log_level.is_none() {
            self.logs = detail.logs.clone();
        }
        self.current = Some(detail.clone());
        Ok(detail)
    }

    /// 按级别拉取日志；level 为 None 时返回全部
    pub async fn fetch_task_logs(
        &mut self,
        task_id: &str,
        level: Option<String>,
    ) -> ActionResult<Vec<TaskLog>> {
        let logs = self
            .client
            .get_logs(task_id, 0, LOG_PAGE_LIMIT, level.as_deref())
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_LOGS, e))?;
        self.log_level = level;
        self.logs = logs.clone();
        Ok(logs)
    }

    pub async fn fetch_task_steps(&mut self, task_id: &str) -> ActionResult<usize> {
        let steps = self
            .client
            .get_steps(task_id)
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_STEPS, e))?;
        let count = steps.len();
        if let Some(ref mut cur) = self.current {
            if cur.summary.id == task_id {
                cur.steps = steps;
            }
        }
        Ok(count)
    }

    pub async fn retry_task_action(
        &mut self,
        task_id: &str,
        reason: Option<String>,
    ) -> ActionResult<TaskSummary> {
        let task = self
            .client
            .retry(task_id, reason.as_deref())
            .await
            .map_err(|e| ActionFailure::new(MSG_RETRY, e))?;
        info!("✓ 任务 {} 已重新提交为 {}", task_id, task.id);
        self.refresh_after_action(task_id).await;
        Ok(task)
    }

    pub async fn cancel_task_action(
        &mut self,
        task_id: &str,
        reason: Option<String>,
    ) -> ActionResult<TaskSummary> {
        let task = self
            .client
            .cancel(task_id, reason.as_deref())
            .await
            .map_err(|e| ActionFailure::new(MSG_CANCEL, e))?;
        info!("✓ 任务 {} 已取消", task_id);
        self.refresh_after_action(task_id).await;
        Ok(task)
    }

    pub async fn delete_task_action(&mut self, task_id: &str, force: bool) -> ActionResult<()> {
        self.client
            .delete(task_id, force)
            .await
            .map_err(|e| ActionFailure::new(MSG_DELETE, e))?;
        info!("✓ 任务 {} 已删除", task_id);
        if self.is_open(task_id) {
            self.current = None;
            self.logs.clear();
            self.log_level = None;
        }
        if let Err(e) = self.fetch_tasks().await {
            warn!("删除后刷新列表失败: {}", e);
        }
        Ok(())
    }

    pub async fn fetch_task_statistics(&mut self) -> ActionResult<TaskStats> {
        let stats = self
            .client
            .stats()
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_STATS, e))?;
        self.stats = Some(stats.clone());
        Ok(stats)
    }

    /// 定时轮询：刷新列表，详情仍在运行时一并刷新
    pub async fn poll(&mut self, include_stats: bool) -> ActionResult<()> {
        self.fetch_tasks().await?;
        let running_id = self
            .current
            .as_ref()
            .filter(|d| !d.summary.status.is_terminal())
            .map(|d| d.summary.id.clone());
        if let Some(id) = running_id {
            self.fetch_task_details(&id).await?;
            if let Some(level) = self.log_level.clone() {
                self.fetch_task_logs(&id, Some(level)).await?;
            }
        }
        if include_stats {
            self.fetch_task_statistics().await?;
        }
        Ok(())
    }

    pub fn close_details(&mut self) {
        self.current = None;
        self.logs.clear();
        self.log_level = None;
    }

    pub fn is_open(&self, task_id: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|d| d.summary.id == task_id)
    }

    async fn refresh_after_action(&mut self, task_id: &str) {
        if let Err(e) = self.fetch_tasks().await {
            warn!("操作后刷新列表失败: {}", e);
        }
        if self.is_open(task_id) {
            if let Err(e) = self.fetch_task_details(task_id).await {
                warn!("操作后刷新详情失败: {}", e);
            }
        }
    }
}
