//! Routing bound SQL to a statement strategy

use std::sync::Arc;

use stmtx_core::{
    BoundSql, Connection, ExecutionSettings, ExecutorConfig, Result, StatementError, StatementKind,
};

use crate::cursor::Cursor;
use crate::direct::DirectStatement;
use crate::handler::{GeneratedKeys, OutParameters, StatementCore, StatementHandler};
use crate::parameter::{DefaultParameterBinder, ParameterBinder};
use crate::parameterized::ParameterizedStatement;
use crate::procedural::ProceduralStatement;
use crate::result::{ResultCallback, ResultMaterializer};

/// Selects the strategy for a statement and builds it.
///
/// Settings of the mapped statement are completed with the config defaults
/// before the strategy is created.
pub struct StatementRouter {
    config: Arc<ExecutorConfig>,
    binder: Arc<dyn ParameterBinder>,
}

impl StatementRouter {
    pub fn new(config: Arc<ExecutorConfig>) -> Self {
        Self {
            config,
            binder: Arc::new(DefaultParameterBinder),
        }
    }

    /// Use a custom parameter binder for every routed statement
    pub fn with_binder(mut self, binder: Arc<dyn ParameterBinder>) -> Self {
        self.binder = binder;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn supports(&self, kind: StatementKind) -> bool {
        self.config.is_enabled(kind)
    }

    /// Route by the kind of the bound SQL's mapped statement
    pub fn route<'c>(&self, bound_sql: BoundSql) -> Result<RoutedStatement<'c>> {
        let kind = bound_sql.statement_kind();
        self.route_kind(kind, bound_sql)
    }

    /// Route by a kind name such as `"prepared"` or `"callable"`
    pub fn route_named<'c>(&self, kind: &str, bound_sql: BoundSql) -> Result<RoutedStatement<'c>> {
        let kind = kind.parse::<StatementKind>()?;
        self.route_kind(kind, bound_sql)
    }

    /// Route with an explicit kind, overriding the mapped statement's
    pub fn route_kind<'c>(&self, kind: StatementKind, bound_sql: BoundSql) -> Result<RoutedStatement<'c>> {
        if !self.supports(kind) {
            return Err(StatementError::UnsupportedStatementKind(format!(
                "{} statements are not enabled",
                kind
            )));
        }

        let settings = self.config.resolve_settings(&bound_sql.mapped_statement().settings);
        let binder = Arc::clone(&self.binder);
        tracing::debug!(
            statement_id = %bound_sql.mapped_statement().id,
            kind = %kind,
            "routing statement"
        );

        Ok(match kind {
            StatementKind::Direct => RoutedStatement::Direct(DirectStatement::new(bound_sql, settings, binder)),
            StatementKind::Parameterized => {
                RoutedStatement::Parameterized(ParameterizedStatement::new(bound_sql, settings, binder))
            }
            StatementKind::Procedural => {
                RoutedStatement::Procedural(ProceduralStatement::new(bound_sql, settings, binder))
            }
        })
    }
}

impl Default for StatementRouter {
    fn default() -> Self {
        Self::new(Arc::new(ExecutorConfig::default()))
    }
}

/// A statement built by the router; forwards every operation to its strategy
pub enum RoutedStatement<'c> {
    Direct(DirectStatement<'c>),
    Parameterized(ParameterizedStatement<'c>),
    Procedural(ProceduralStatement<'c>),
}

macro_rules! dispatch {
    ($self:expr, $handler:ident => $body:expr) => {
        match $self {
            RoutedStatement::Direct($handler) => $body,
            RoutedStatement::Parameterized($handler) => $body,
            RoutedStatement::Procedural($handler) => $body,
        }
    };
}

impl<'c> RoutedStatement<'c> {
    /// Output values of the last execution; empty unless procedural
    pub fn out_parameters(&self) -> Option<&OutParameters> {
        match self {
            RoutedStatement::Procedural(statement) => Some(statement.out_parameters()),
            _ => None,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut StatementCore<'c> {
        dispatch!(self, handler => handler.core_mut())
    }
}

impl<'c> StatementHandler<'c> for RoutedStatement<'c> {
    fn kind(&self) -> StatementKind {
        dispatch!(self, handler => handler.kind())
    }

    fn prepare(&mut self, connection: &'c dyn Connection, transaction_timeout: Option<u32>) -> Result<()> {
        dispatch!(self, handler => handler.prepare(connection, transaction_timeout))
    }

    fn parameterize(&mut self) -> Result<()> {
        dispatch!(self, handler => handler.parameterize())
    }

    fn rebind(&mut self, bound_sql: BoundSql) -> Result<()> {
        dispatch!(self, handler => handler.rebind(bound_sql))
    }

    fn update(&mut self) -> Result<u64> {
        dispatch!(self, handler => handler.update())
    }

    fn query<M: ResultMaterializer>(
        &mut self,
        materializer: &M,
        callback: Option<&mut dyn ResultCallback<M::Output>>,
    ) -> Result<Vec<M::Output>> {
        dispatch!(self, handler => handler.query(materializer, callback))
    }

    fn query_cursor<'s, M: ResultMaterializer>(&'s mut self, materializer: M) -> Result<Cursor<'s, M>> {
        dispatch!(self, handler => handler.query_cursor(materializer))
    }

    fn batch(&mut self) -> Result<()> {
        dispatch!(self, handler => handler.batch())
    }

    fn close(&mut self) -> Result<()> {
        dispatch!(self, handler => handler.close())
    }

    fn bound_sql(&self) -> &BoundSql {
        dispatch!(self, handler => handler.bound_sql())
    }

    fn parameter_binder(&self) -> &dyn ParameterBinder {
        dispatch!(self, handler => handler.parameter_binder())
    }

    fn settings(&self) -> &ExecutionSettings {
        dispatch!(self, handler => handler.settings())
    }

    fn generated_keys(&self) -> &GeneratedKeys {
        dispatch!(self, handler => handler.generated_keys())
    }

    fn is_prepared(&self) -> bool {
        dispatch!(self, handler => handler.is_prepared())
    }

    fn is_closed(&self) -> bool {
        dispatch!(self, handler => handler.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stmtx_core::{MappedStatement, ResultSetType};

    fn bound(kind: StatementKind) -> BoundSql {
        let statement = MappedStatement::new("select", kind)
            .with_settings(ExecutionSettings::new().with_fetch_size(10));
        BoundSql::new(Arc::new(statement), "SELECT 1")
    }

    #[test]
    fn test_route_selects_strategy_by_kind() {
        let router = StatementRouter::default();

        for kind in StatementKind::ALL {
            let routed = router.route(bound(kind)).unwrap();
            assert_eq!(routed.kind(), kind);
            assert!(!routed.is_prepared());
            assert!(!routed.is_closed());
            assert_eq!(routed.out_parameters().is_some(), kind == StatementKind::Procedural);
        }
    }

    #[test]
    fn test_disabled_kind_is_unsupported() {
        let config = ExecutorConfig {
            enabled_kinds: vec![StatementKind::Direct, StatementKind::Parameterized],
            ..ExecutorConfig::default()
        };
        let router = StatementRouter::new(Arc::new(config));

        assert!(router.route(bound(StatementKind::Direct)).is_ok());
        let err = router.route(bound(StatementKind::Procedural)).err().unwrap();
        assert!(matches!(err, StatementError::UnsupportedStatementKind(_)));
    }

    #[test]
    fn test_route_named_rejects_unknown_kinds() {
        let router = StatementRouter::default();

        let routed = router.route_named("callable", bound(StatementKind::Direct)).unwrap();
        assert_eq!(routed.kind(), StatementKind::Procedural);

        let err = router.route_named("batch", bound(StatementKind::Direct)).err().unwrap();
        assert!(matches!(err, StatementError::UnsupportedStatementKind(ref k) if k == "batch"));
    }

    #[test]
    fn test_routed_settings_include_config_defaults() {
        let config = ExecutorConfig {
            default_statement_timeout: Some(25),
            default_fetch_size: Some(1000),
            default_result_set_type: Some(ResultSetType::ScrollInsensitive),
            ..ExecutorConfig::default()
        };
        let router = StatementRouter::new(Arc::new(config));

        let routed = router.route(bound(StatementKind::Parameterized)).unwrap();
        assert_eq!(routed.settings().timeout, Some(25));
        assert_eq!(routed.settings().fetch_size, Some(10));
        assert_eq!(routed.settings().result_set_type, ResultSetType::ScrollInsensitive);
    }

    #[test]
    fn test_operations_before_prepare_fail() {
        let router = StatementRouter::default();
        let mut routed = router.route(bound(StatementKind::Parameterized)).unwrap();

        assert!(matches!(routed.parameterize(), Err(StatementError::NotPrepared { .. })));
        assert!(matches!(routed.update(), Err(StatementError::NotPrepared { .. })));
        assert!(matches!(routed.batch(), Err(StatementError::NotPrepared { .. })));

        routed.close().unwrap();
        assert!(routed.is_closed());
        assert!(matches!(routed.close(), Err(StatementError::AlreadyClosed { .. })));
    }
}
