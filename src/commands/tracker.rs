// 追踪器命令模块
// 提供给界面层调用的操作：题库加载、登录切换、练习状态切换（乐观更新）与随机抽题

use crate::config::{open_store, TrackerConfig};
use crate::error::{FetchError, WriteError};
use crate::models::{InvalidUserId, PracticedMap, PracticedRecord, Problem, UserId};
use crate::services::catalog::CatalogAccessor;
use crate::services::grouping::group_by_topic;
use crate::services::practiced::{Clock, PracticedSync, PracticedTransition, SystemClock};
use crate::services::selector::pick_random_unpracticed;
use crate::services::store::{DocumentStore, StoreLayout};
use log::{info, warn};
use rand::Rng;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// 命令错误
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("sign in required")]
    AuthRequired,

    #[error(transparent)]
    InvalidUser(#[from] InvalidUserId),

    #[error("{0} not loaded")]
    NotLoaded(&'static str),

    #[error("unknown problem: {0}")]
    UnknownProblem(String),

    #[error("toggle already pending for problem {0}")]
    TogglePending(String),

    #[error("signed-in user changed while the request was running")]
    SessionChanged,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

// 界面层只需要错误文本
impl Serialize for CommandError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// 题目传输对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemDto {
    pub id: String,
    pub topic: Option<String>,
    pub question: String,
    pub link: String,
    pub practiced: bool,
}

impl ProblemDto {
    fn from_problem(problem: &Problem, practiced: Option<&PracticedMap>) -> Self {
        Self {
            id: problem.id.clone(),
            topic: problem.topic.clone(),
            question: problem.question.clone(),
            link: problem.link.clone(),
            practiced: practiced.is_some_and(|map| map.contains_key(&problem.id)),
        }
    }
}

/// 主题分组传输对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicGroupDto {
    pub topic: Option<String>,
    pub practiced_count: usize,
    pub problems: Vec<ProblemDto>,
}

/// 练习记录传输对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PracticedRecordDto {
    pub problem_id: String,
    pub question: String,
    pub timestamp: String,
}

/// 登录会话信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDto {
    pub user_id: String,
    pub practiced_count: usize,
}

/// 随机抽题结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RandomPickDto {
    AuthRequired,
    AllPracticed,
    Picked { problem: ProblemDto },
}

/// 主题进度
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicProgressDto {
    pub topic: Option<String>,
    pub total: usize,
    pub practiced: usize,
}

/// 进度统计传输对象
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressStatsDto {
    pub total_problems: usize,
    pub practiced_count: usize,
    pub completion_rate: f64,
    pub topics: Vec<TopicProgressDto>,
}

#[derive(Debug, Default)]
struct Session {
    user: Option<UserId>,
    problems: Option<Vec<Problem>>,
    // None 表示尚未加载，与“没有练习记录”区分
    practiced: Option<PracticedMap>,
    pending: HashSet<String>,
}

/// 追踪器应用状态
pub struct TrackerState {
    catalog: CatalogAccessor,
    sync: PracticedSync,
    session: Mutex<Session>,
}

impl TrackerState {
    pub fn new(store: Arc<dyn DocumentStore>, layout: StoreLayout, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: CatalogAccessor::new(store.clone(), layout.catalog_collection.clone()),
            sync: PracticedSync::new(store, layout, clock),
            session: Mutex::new(Session::default()),
        }
    }

    /// 按配置打开存储并使用系统时钟
    pub fn from_config(config: &TrackerConfig) -> anyhow::Result<Self> {
        let store = open_store(&config.backend)?;
        info!("using {} document store", store.backend_tag());
        Ok(Self::new(store, config.layout.clone(), Arc::new(SystemClock)))
    }

    pub async fn current_user(&self) -> Option<UserId> {
        self.session.lock().await.user.clone()
    }
}

fn build_groups(problems: &[Problem], practiced: Option<&PracticedMap>) -> Vec<TopicGroupDto> {
    group_by_topic(problems)
        .into_iter()
        .map(|(topic, problems)| {
            let problems: Vec<ProblemDto> = problems
                .iter()
                .map(|p| ProblemDto::from_problem(p, practiced))
                .collect();
            TopicGroupDto {
                topic,
                practiced_count: problems.iter().filter(|p| p.practiced).count(),
                problems,
            }
        })
        .collect()
}

/// 加载题库，返回分组视图
pub async fn load_catalog(state: &TrackerState) -> Result<Vec<TopicGroupDto>, CommandError> {
    let problems = state.catalog.fetch_all_problems().await?;
    info!("loaded {} problems from {}", problems.len(), state.catalog.collection());

    let mut session = state.session.lock().await;
    let groups = build_groups(&problems, session.practiced.as_ref());
    session.problems = Some(problems);
    Ok(groups)
}

/// 当前缓存的分组视图
pub async fn grouped_problems(state: &TrackerState) -> Result<Vec<TopicGroupDto>, CommandError> {
    let session = state.session.lock().await;
    let problems = session.problems.as_ref().ok_or(CommandError::NotLoaded("catalog"))?;
    Ok(build_groups(problems, session.practiced.as_ref()))
}

/// 登录（或切换用户），重新读取练习记录
pub async fn sign_in(state: &TrackerState, user_id: String) -> Result<SessionDto, CommandError> {
    let user = UserId::new(user_id)?;
    {
        let mut session = state.session.lock().await;
        // 同一用户重新登录时保留进行中的切换
        if session.user.as_ref() != Some(&user) {
            session.user = Some(user.clone());
            session.practiced = None;
            session.pending.clear();
        }
    }
    info!("signed in as {}", user);

    load_practiced(state, &user).await
}

/// 登出，清空用户相关的缓存
pub async fn sign_out(state: &TrackerState) -> Result<(), CommandError> {
    let mut session = state.session.lock().await;
    if let Some(user) = session.user.take() {
        info!("signed out {}", user);
    }
    session.practiced = None;
    session.pending.clear();
    Ok(())
}

/// 重新读取当前用户的练习记录
pub async fn refresh_practiced(state: &TrackerState) -> Result<SessionDto, CommandError> {
    let user = state.current_user().await.ok_or(CommandError::AuthRequired)?;
    load_practiced(state, &user).await
}

async fn load_practiced(state: &TrackerState, user: &UserId) -> Result<SessionDto, CommandError> {
    let practiced = state.sync.fetch_practiced(user).await?;

    let mut session = state.session.lock().await;
    if session.user.as_ref() != Some(user) {
        return Err(CommandError::SessionChanged);
    }
    let dto = SessionDto {
        user_id: user.to_string(),
        practiced_count: practiced.len(),
    };
    session.practiced = Some(practiced);
    Ok(dto)
}

/// 切换题目的练习状态，返回切换后的状态
///
/// 本地状态立即更新，远端写入失败时回滚。同一道题的切换未完成前拒绝再次切换。
pub async fn toggle_practiced(state: &TrackerState, problem_id: String) -> Result<bool, CommandError> {
    let (user, problem, currently_practiced, previous) = {
        let mut session = state.session.lock().await;
        let user = session.user.clone().ok_or(CommandError::AuthRequired)?;
        let problem = session
            .problems
            .as_ref()
            .ok_or(CommandError::NotLoaded("catalog"))?
            .iter()
            .find(|p| p.id == problem_id)
            .cloned()
            .ok_or_else(|| CommandError::UnknownProblem(problem_id.clone()))?;
        if session.pending.contains(&problem_id) {
            return Err(CommandError::TogglePending(problem_id));
        }

        let practiced = session
            .practiced
            .as_mut()
            .ok_or(CommandError::NotLoaded("practiced"))?;
        let currently_practiced = practiced.contains_key(&problem_id);

        // 乐观更新
        let previous = if currently_practiced {
            practiced.remove(&problem_id)
        } else {
            let provisional = PracticedRecord::for_problem(&problem, state.sync.clock().now());
            practiced.insert(problem_id.clone(), provisional);
            None
        };
        session.pending.insert(problem_id.clone());

        (user, problem, currently_practiced, previous)
    };

    let result = state.sync.toggle(&user, &problem, currently_practiced).await;

    let mut session = state.session.lock().await;
    session.pending.remove(&problem_id);
    if session.user.as_ref() != Some(&user) {
        return match result {
            Ok(_) => Err(CommandError::SessionChanged),
            Err(e) => Err(e.into()),
        };
    }

    let Some(practiced) = session.practiced.as_mut() else {
        return Err(CommandError::SessionChanged);
    };
    match result {
        Ok(PracticedTransition::Marked(record)) => {
            practiced.insert(problem_id, record);
            Ok(true)
        }
        Ok(PracticedTransition::Unmarked) => {
            practiced.remove(&problem_id);
            Ok(false)
        }
        Err(e) => {
            warn!("reverting optimistic toggle of {}: {}", problem_id, e);
            if currently_practiced {
                if let Some(record) = previous {
                    practiced.insert(problem_id, record);
                }
            } else {
                practiced.remove(&problem_id);
            }
            Err(e.into())
        }
    }
}

/// 随机抽取一道未练习的题目
pub async fn random_problem(state: &TrackerState) -> Result<RandomPickDto, CommandError> {
    let session = state.session.lock().await;
    pick_for_session(&session, &mut rand::thread_rng())
}

/// 使用指定随机源抽题
pub async fn random_problem_with<R>(state: &TrackerState, rng: &mut R) -> Result<RandomPickDto, CommandError>
where
    R: Rng + ?Sized,
{
    let session = state.session.lock().await;
    pick_for_session(&session, rng)
}

fn pick_for_session<R>(session: &Session, rng: &mut R) -> Result<RandomPickDto, CommandError>
where
    R: Rng + ?Sized,
{
    // 未登录时直接提示登录，不把“未加载”当作“没有练习记录”
    if session.user.is_none() {
        return Ok(RandomPickDto::AuthRequired);
    }
    let problems = session.problems.as_ref().ok_or(CommandError::NotLoaded("catalog"))?;
    let practiced = session
        .practiced
        .as_ref()
        .ok_or(CommandError::NotLoaded("practiced"))?;

    Ok(match pick_random_unpracticed(problems, practiced, rng) {
        Some(problem) => RandomPickDto::Picked {
            problem: ProblemDto::from_problem(problem, Some(practiced)),
        },
        None => RandomPickDto::AllPracticed,
    })
}

/// 当前用户的练习记录，最近的在前
pub async fn practiced_records(state: &TrackerState) -> Result<Vec<PracticedRecordDto>, CommandError> {
    let session = state.session.lock().await;
    if session.user.is_none() {
        return Err(CommandError::AuthRequired);
    }
    let practiced = session
        .practiced
        .as_ref()
        .ok_or(CommandError::NotLoaded("practiced"))?;

    let mut records: Vec<&PracticedRecord> = practiced.values().collect();
    records.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.problem_id.cmp(&b.problem_id))
    });

    Ok(records
        .into_iter()
        .map(|r| PracticedRecordDto {
            problem_id: r.problem_id.clone(),
            question: r.question.clone(),
            timestamp: r.timestamp.to_rfc3339(),
        })
        .collect())
}

/// 进度统计，未登录时练习数为 0
pub async fn progress_stats(state: &TrackerState) -> Result<ProgressStatsDto, CommandError> {
    let session = state.session.lock().await;
    let problems = session.problems.as_ref().ok_or(CommandError::NotLoaded("catalog"))?;
    let groups = build_groups(problems, session.practiced.as_ref());

    let total_problems = problems.len();
    let practiced_count: usize = groups.iter().map(|g| g.practiced_count).sum();
    let completion_rate = if total_problems > 0 {
        practiced_count as f64 / total_problems as f64 * 100.0
    } else {
        0.0
    };

    Ok(ProgressStatsDto {
        total_problems,
        practiced_count,
        completion_rate,
        topics: groups
            .into_iter()
            .map(|g| TopicProgressDto {
                topic: g.topic,
                total: g.problems.len(),
                practiced: g.practiced_count,
            })
            .collect(),
    })
}
