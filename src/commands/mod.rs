// 命令模块
// 提供供界面层调用的命令接口

pub mod tracker;

pub use tracker::{
    load_catalog,
    grouped_problems,
    sign_in,
    sign_out,
    refresh_practiced,
    toggle_practiced,
    random_problem,
    random_problem_with,
    practiced_records,
    progress_stats,
    TrackerState,
    CommandError,
    ProblemDto,
    TopicGroupDto,
    PracticedRecordDto,
    SessionDto,
    RandomPickDto,
    ProgressStatsDto,
    TopicProgressDto,
};
