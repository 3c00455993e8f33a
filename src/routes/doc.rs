use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    domain::{
        Order, OrderItem, OrderStatus, PaymentMethod, PaymentReceipt, PaymentStatus,
        ShippingAddress, Totals, TransitionMetadata,
    },
    dto::{
        auth::{LoginRequest, LoginResponse, OtpSent, RegisterRequest, ResendOtpRequest, VerifyOtpRequest},
        contact::ContactRequest,
        content::{ColorTileList, HeroImageList},
        dashboard::{DashboardSummary, InventoryAdjustRequest, StatusCount},
        orders::{
            CreateOrderRequest, OrderHistory, OrderList, UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        subscribers::{SubscribeRequest, SubscriberList},
        verification::{ResolveVerificationRequest, VerificationList},
    },
    models::{
        AuditEntry, ColorTile, HeroImage, Product, StudentVerification, Subscriber, User,
        VerificationStatus,
    },
    notifications::{BulkFailure, BulkSendReport},
    response::{ApiResponse, Meta},
    routes::{auth, content, dashboard, health, orders, products, subscribers, verification},
    storage::UploadedImage,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::ping,
        auth::register,
        auth::verify_otp,
        auth::resend_otp,
        auth::login,
        auth::me,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::add_product_image,
        products::delete_product,
        orders::create_order,
        orders::list_my_orders,
        orders::list_all_orders,
        orders::get_order,
        orders::update_order_status,
        orders::update_payment_status,
        orders::upload_receipt,
        orders::order_history,
        verification::submit_request,
        verification::list_requests,
        verification::my_requests,
        verification::resolve_request,
        content::list_hero_images,
        content::create_hero_image,
        content::delete_hero_image,
        content::list_color_tiles,
        content::create_color_tile,
        content::update_color_tile,
        content::delete_color_tile,
        subscribers::subscribe,
        subscribers::list_subscribers,
        subscribers::send_bulk_email,
        subscribers::contact,
        dashboard::summary,
        dashboard::list_low_stock,
        dashboard::adjust_inventory
    ),
    components(
        schemas(
            User,
            Product,
            Order,
            OrderItem,
            ShippingAddress,
            PaymentReceipt,
            Totals,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            TransitionMetadata,
            UploadedImage,
            StudentVerification,
            VerificationStatus,
            HeroImage,
            ColorTile,
            Subscriber,
            AuditEntry,
            BulkFailure,
            BulkSendReport,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            VerifyOtpRequest,
            ResendOtpRequest,
            OtpSent,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
            OrderList,
            OrderHistory,
            ResolveVerificationRequest,
            VerificationList,
            HeroImageList,
            ColorTileList,
            SubscribeRequest,
            SubscriberList,
            ContactRequest,
            DashboardSummary,
            StatusCount,
            InventoryAdjustRequest,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<BulkSendReport>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration, OTP and login"),
        (name = "Products", description = "Product catalog"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Student Verification", description = "Student discount verification"),
        (name = "Content", description = "Hero images and color tiles"),
        (name = "Subscribers", description = "Newsletter"),
        (name = "Contact", description = "Contact form"),
        (name = "Dashboard", description = "Admin overview and inventory"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_and_dashboard_routes_are_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/orders",
            "/api/orders/{id}",
            "/api/orders/{id}/status",
            "/api/orders/{id}/payment",
            "/api/orders/{id}/receipt",
            "/api/orders/{id}/history",
            "/api/dashboard",
            "/api/dashboard/low-stock",
            "/api/dashboard/inventory/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
