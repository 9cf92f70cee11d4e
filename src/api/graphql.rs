//! GraphQL surface
//!
//! Read-only query root over the metrics service. The resolved tenant is
//! attached to each request as context data by the HTTP handler.

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, InputObject, Object, Schema, SimpleObject,
};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::{Extension, State};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::{DataSource, MetricsFilters, TenantContext};
use crate::metrics::{
    AnomalyPoint, MetricsReport, MetricsService, RevenueTrendPoint, SourceBreakdownPoint,
};
use crate::repository::RepositoryError;

use super::state::AppState;

pub type FinIntelSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn build_schema(metrics: MetricsService) -> FinIntelSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(metrics)
        .finish()
}

#[derive(Debug, Default, InputObject)]
pub struct MetricsFilterInput {
    pub months: Option<i32>,
    pub source: Option<DataSource>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl From<Option<MetricsFilterInput>> for MetricsFilters {
    fn from(input: Option<MetricsFilterInput>) -> Self {
        let input = input.unwrap_or_default();
        MetricsFilters::from_input(input.months, input.source, input.from, input.to)
    }
}

fn float(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

#[derive(SimpleObject)]
#[graphql(name = "RevenueTrendPoint")]
pub struct TrendPointObject {
    period: String,
    revenue: f64,
    expenses: f64,
    net_profit: f64,
}

impl From<RevenueTrendPoint> for TrendPointObject {
    fn from(point: RevenueTrendPoint) -> Self {
        Self {
            period: point.period,
            revenue: float(point.revenue),
            expenses: float(point.expenses),
            net_profit: float(point.net_profit),
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "MetricsTotals")]
pub struct TotalsObject {
    revenue: f64,
    expenses: f64,
    net_profit: f64,
}

#[derive(SimpleObject)]
#[graphql(name = "Metrics")]
pub struct MetricsObject {
    trend: Vec<TrendPointObject>,
    totals: TotalsObject,
}

impl From<MetricsReport> for MetricsObject {
    fn from(report: MetricsReport) -> Self {
        Self {
            trend: report.trend.into_iter().map(Into::into).collect(),
            totals: TotalsObject {
                revenue: float(report.totals.revenue),
                expenses: float(report.totals.expenses),
                net_profit: float(report.totals.net_profit),
            },
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "SourceBreakdownPoint")]
pub struct SourcePointObject {
    source: DataSource,
    revenue: f64,
    expenses: f64,
    net_profit: f64,
    records: i32,
}

impl From<SourceBreakdownPoint> for SourcePointObject {
    fn from(point: SourceBreakdownPoint) -> Self {
        Self {
            source: point.source,
            revenue: float(point.revenue),
            expenses: float(point.expenses),
            net_profit: float(point.net_profit),
            records: i32::try_from(point.records).unwrap_or(i32::MAX),
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "AnomalyPoint")]
pub struct AnomalyObject {
    period: String,
    revenue: f64,
    net_profit: f64,
    deviation: f64,
}

impl From<AnomalyPoint> for AnomalyObject {
    fn from(point: AnomalyPoint) -> Self {
        Self {
            period: point.period,
            revenue: float(point.revenue),
            net_profit: float(point.net_profit),
            deviation: point.deviation,
        }
    }
}

fn resolver_error(err: RepositoryError) -> async_graphql::Error {
    if err.is_schema_missing() {
        async_graphql::Error::new("Tenant schema is not migrated")
    } else {
        tracing::error!(error = %err, "GraphQL resolver failed");
        async_graphql::Error::new("Internal server error")
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn metrics(
        &self,
        ctx: &Context<'_>,
        filters: Option<MetricsFilterInput>,
    ) -> async_graphql::Result<MetricsObject> {
        let service = ctx.data::<MetricsService>()?;
        let tenant = ctx.data::<TenantContext>()?;

        let report = service
            .get_metrics(tenant.id(), &filters.into())
            .await
            .map_err(resolver_error)?;
        Ok(report.into())
    }

    async fn source_breakdown(
        &self,
        ctx: &Context<'_>,
        filters: Option<MetricsFilterInput>,
    ) -> async_graphql::Result<Vec<SourcePointObject>> {
        let service = ctx.data::<MetricsService>()?;
        let tenant = ctx.data::<TenantContext>()?;

        let sources = service
            .get_source_breakdown(tenant.id(), &filters.into())
            .await
            .map_err(resolver_error)?;
        Ok(sources.into_iter().map(Into::into).collect())
    }

    async fn anomalies(
        &self,
        ctx: &Context<'_>,
        filters: Option<MetricsFilterInput>,
    ) -> async_graphql::Result<Vec<AnomalyObject>> {
        let service = ctx.data::<MetricsService>()?;
        let tenant = ctx.data::<TenantContext>()?;

        let anomalies = service
            .get_anomalies(tenant.id(), &filters.into())
            .await
            .map_err(resolver_error)?;
        Ok(anomalies.into_iter().map(Into::into).collect())
    }
}

/// POST /graphql
pub async fn graphql_handler(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    state
        .schema
        .execute(request.into_inner().data(tenant))
        .await
        .into()
}
