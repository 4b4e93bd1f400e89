mod dispatcher;
mod ui;

pub use dispatcher::{
    CREATE_TEXT_WIDGET, DEFAULT_WIDGET_TITLE, DEFAULT_WORKER_THREADS, DispatchCall, DispatchError,
    DispatchResult, DispatchTarget, Dispatcher, EMPTY_RESULT, UNKNOWN_TARGET, agent_target_name,
};
pub use ui::{
    DEFAULT_UI_QUEUE_CAPACITY, UiCommand, UiQueue, UiQueueError, WidgetKind, drain_ui_commands,
    log_ui_command, spawn_console_renderer, ui_channel,
};
