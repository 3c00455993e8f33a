//! HTML bodies for every outbound email.
//!
//! Renderers are pure: they take borrowed data and return the subject and
//! body. All user-supplied text passes through [`escape`].

use std::fmt::Write;

use base64::{Engine, engine::general_purpose::STANDARD};

use super::transport::Attachment;
use crate::domain::{Order, OrderStatus, PaymentMethod, otp::OtpKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

/// Fields of a student verification request shown in emails.
#[derive(Debug, Clone, Copy)]
pub struct VerificationNotice<'a> {
    pub student_name: &'a str,
    pub student_email: &'a str,
    pub institution: &'a str,
    pub student_id_number: &'a str,
    pub document_url: &'a str,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn multiline(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

fn money(amount: f64) -> String {
    format!("PKR {amount:.2}")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #2c3e50;">{title}</h2>
{body}
<p style="color: #7f8c8d; font-size: 12px; margin-top: 30px;">Best regards,<br>The Steth Team</p>
</div>"#
    )
}

fn items_table(order: &Order) -> String {
    let mut rows = String::new();
    for item in &order.items {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&item.product_name),
            escape(&item.color),
            escape(&item.size),
            item.quantity,
            money(item.price * f64::from(item.quantity)),
        );
    }
    format!(
        "<table style=\"width: 100%; border-collapse: collapse;\">\
<tr><th>Product</th><th>Color</th><th>Size</th><th>Qty</th><th>Amount</th></tr>{rows}</table>"
    )
}

fn summary(order: &Order) -> String {
    let t = &order.totals;
    let mut out = format!("<p>Subtotal: {}</p>", money(t.subtotal));
    if t.discount > 0.0 {
        let code = if order.discount_code.is_empty() {
            String::new()
        } else {
            format!(" ({})", escape(&order.discount_code))
        };
        let _ = write!(out, "<p>Discount{code}: -{}</p>", money(t.discount));
    }
    if order.points_used > 0 {
        let _ = write!(out, "<p>Points used: {}</p>", order.points_used);
    }
    let shipping = if t.shipping_charges > 0.0 {
        money(t.shipping_charges)
    } else {
        "Free".to_string()
    };
    let _ = write!(
        out,
        "<p>Shipping: {shipping}</p><p><strong>Total: {}</strong></p>",
        money(t.total)
    );
    if order.points_earned > 0 {
        let _ = write!(out, "<p>Points earned: {}</p>", order.points_earned);
    }
    out
}

fn address(order: &Order) -> String {
    let a = &order.shipping_address;
    let line2 = a
        .address_line2
        .as_deref()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("{}<br>", escape(l)))
        .unwrap_or_default();
    format!(
        "<p>{}<br>{}<br>{line2}{}, {} {}<br>{}<br>Phone: {}</p>",
        escape(&a.full_name),
        escape(&a.address_line1),
        escape(&a.city),
        escape(&a.state),
        escape(&a.postal_code),
        escape(&a.country),
        escape(&a.phone_number),
    )
}

pub fn new_order_admin(order: &Order) -> Rendered {
    let mut body = format!(
        "<p>A new order <strong>{}</strong> was placed by {}.</p>\
<p>Payment method: {} ({})</p>{}",
        order.reference(),
        escape(&order.customer_email),
        order.payment_method.label(),
        order.payment_status.as_str(),
        if order.is_first_order { "<p>First order from this customer.</p>" } else { "" },
    );
    body.push_str(&items_table(order));
    body.push_str(&summary(order));
    if order.payment_method == PaymentMethod::BankTransfer {
        if let Some(receipt) = &order.payment_receipt {
            let _ = write!(
                body,
                "<p><a href=\"{}\">View payment receipt</a></p>",
                escape(&receipt.url)
            );
        }
    }
    body.push_str("<h3>Shipping address</h3>");
    body.push_str(&address(order));
    let _ = write!(
        body,
        "<p style=\"font-size: 12px;\">Order received at {}</p>",
        order.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    Rendered {
        subject: format!("New Order #{}", order.id),
        html: layout("New order received", &body),
    }
}

pub fn order_confirmation(order: &Order) -> Rendered {
    let mut body = format!(
        "<p>Dear {},</p><p>Thank you for your order! Your order number is <strong>{}</strong>.</p>",
        escape(&order.shipping_address.full_name),
        order.reference(),
    );
    body.push_str(&items_table(order));
    body.push_str(&summary(order));
    body.push_str("<h3>Shipping to</h3>");
    body.push_str(&address(order));
    Rendered {
        subject: format!("Order Confirmed #{}", order.id),
        html: layout("Order confirmed", &body),
    }
}

/// Customer-facing line describing the order's current status.
pub fn status_message(order: &Order) -> String {
    match order.order_status {
        OrderStatus::Pending => {
            "Your order is pending confirmation. We will update you once it has been processed."
                .to_string()
        }
        OrderStatus::Confirmed => {
            "Your order has been confirmed! We are preparing your items for processing.".to_string()
        }
        OrderStatus::Processing => {
            "Your order is now being processed. We are preparing your items for shipment."
                .to_string()
        }
        OrderStatus::Shipped => match order.tracking_number.as_deref() {
            Some(tracking) if !tracking.is_empty() => format!(
                "Your order has been shipped! Your tracking number is: {}",
                escape(tracking)
            ),
            _ => "Your order has been shipped! You will receive tracking information shortly."
                .to_string(),
        },
        OrderStatus::Delivered => {
            "Your order has been delivered. We hope you enjoy your purchase!".to_string()
        }
        OrderStatus::Cancelled => {
            let mut msg = "Your order has been cancelled. If you have any questions, please contact our customer support.".to_string();
            if let Some(reason) = &order.cancellation_reason {
                let _ = write!(msg, " Reason: {}", escape(reason));
            }
            msg
        }
    }
}

pub fn status_update(order: &Order) -> Rendered {
    let subject = match order.order_status {
        OrderStatus::Cancelled => format!("Order #{} Cancelled", order.id),
        status => format!("Order #{} Status Update: {}", order.id, status),
    };
    let mut body = format!(
        "<p>Dear {},</p><p>{}</p><p>Order: <strong>{}</strong><br>Status: <strong>{}</strong><br>Total: {}</p>",
        escape(&order.shipping_address.full_name),
        status_message(order),
        order.reference(),
        order.order_status,
        money(order.totals.total),
    );
    if let Some(eta) = order.estimated_delivery {
        let _ = write!(body, "<p>Estimated delivery: {}</p>", eta.format("%Y-%m-%d"));
    }
    Rendered {
        subject,
        html: layout("Order update", &body),
    }
}

pub fn verification_request(notice: &VerificationNotice<'_>) -> Rendered {
    let body = format!(
        "<p>A new student verification request needs review.</p>\
<p>Name: {}<br>Email: {}<br>Institution: {}<br>Student ID: {}</p>\
<p><a href=\"{}\">View submitted document</a></p>",
        escape(notice.student_name),
        escape(notice.student_email),
        escape(notice.institution),
        escape(notice.student_id_number),
        escape(notice.document_url),
    );
    Rendered {
        subject: "New Student Verification Request".to_string(),
        html: layout("Student verification request", &body),
    }
}

pub fn verification_result(
    notice: &VerificationNotice<'_>,
    approved: bool,
    note: Option<&str>,
) -> Rendered {
    let (subject, mut body) = if approved {
        (
            "Your Student Verification is Approved",
            format!(
                "<p>Dear {},</p><p>Congratulations! Your student status at {} has been verified. \
Student discounts are now available on your account.</p>",
                escape(notice.student_name),
                escape(notice.institution),
            ),
        )
    } else {
        (
            "Your Student Verification was Rejected",
            format!(
                "<p>Dear {},</p><p>Unfortunately we could not verify your student status. \
You can submit a new request with a clearer document.</p>",
                escape(notice.student_name),
            ),
        )
    };
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        let _ = write!(body, "<p>Note from our team: {}</p>", multiline(note));
    }
    Rendered {
        subject: subject.to_string(),
        html: layout("Student verification", &body),
    }
}

pub fn otp(code: &str, kind: OtpKind, ttl_minutes: i64) -> Rendered {
    let (subject, intro) = match kind {
        OtpKind::Initial => ("Your OTP Code", "Use the code below to verify your account."),
        OtpKind::Resend => ("Your New OTP Code", "Here is your new verification code."),
    };
    let body = format!(
        "<p>{intro}</p><p style=\"font-size: 24px; letter-spacing: 2px; text-align: center;\"><strong>{}</strong></p>\
<p>This code expires in {ttl_minutes} minutes.</p>",
        escape(code)
    );
    Rendered {
        subject: subject.to_string(),
        html: layout("Email verification", &body),
    }
}

pub fn contact_admin(name: &str, email: &str, message: &str) -> Rendered {
    let body = format!(
        "<p>Name: {}<br>Email: {}</p><div style=\"background: #f8f9fa; padding: 15px;\">{}</div>",
        escape(name),
        escape(email),
        multiline(message),
    );
    Rendered {
        subject: "New Contact Form Submission".to_string(),
        html: layout("Contact form submission", &body),
    }
}

pub fn contact_reply(name: &str, message: &str) -> Rendered {
    let body = format!(
        "<p>Dear {},</p><p>We have received your message and will get back to you as soon as possible. \
For your records, here's a copy of your message:</p>\
<div style=\"background: #f8f9fa; padding: 15px;\">{}</div>\
<p>If you have any additional questions or comments, please don't hesitate to contact us again.</p>",
        escape(name),
        multiline(message),
    );
    Rendered {
        subject: "Thank you for contacting us".to_string(),
        html: layout("Thank you for reaching out", &body),
    }
}

pub fn welcome(image: Option<&Attachment>) -> Rendered {
    let banner = image
        .map(|img| format!("<img src=\"{}\" alt=\"Welcome\" style=\"max-width: 100%;\">", data_uri(img)))
        .unwrap_or_default();
    let body = format!(
        "{banner}<p>Thank you for subscribing to our newsletter. We're excited to have you join our community!</p>\
<p>You'll be the first to know about our latest updates, news, and special offers.</p>"
    );
    Rendered {
        subject: "Welcome to Our Newsletter!".to_string(),
        html: layout("Welcome!", &body),
    }
}

pub fn bulk(subject: &str, message: &str, images: &[Attachment]) -> Rendered {
    let mut body = format!("<p>{}</p>", multiline(message));
    for (index, image) in images.iter().enumerate() {
        let _ = write!(
            body,
            "<img src=\"{}\" alt=\"Image {}\" style=\"max-width: 100%; margin: 10px 0;\">",
            data_uri(image),
            index + 1
        );
    }
    body.push_str(
        "<p style=\"font-size: 12px;\">You're receiving this email because you subscribed to our newsletter.</p>",
    );
    Rendered {
        subject: subject.to_string(),
        html: layout(&escape(subject), &body),
    }
}

fn data_uri(image: &Attachment) -> String {
    format!("data:{};base64,{}", image.content_type, STANDARD.encode(&image.content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::tests::sample_order;

    #[test]
    fn shipped_with_tracking_includes_it_verbatim() {
        let mut order = sample_order();
        order.order_status = OrderStatus::Shipped;
        order.tracking_number = Some("LEO-99812-PK".into());
        let rendered = status_update(&order);
        assert!(rendered.html.contains("Your tracking number is: LEO-99812-PK"));
        assert!(rendered.subject.contains("Status Update: shipped"));
    }

    #[test]
    fn shipped_without_tracking_uses_generic_line() {
        let mut order = sample_order();
        order.order_status = OrderStatus::Shipped;
        let msg = status_message(&order);
        assert!(msg.contains("You will receive tracking information shortly."));
        assert!(!msg.contains("tracking number is"));
    }

    #[test]
    fn cancelled_has_its_own_subject() {
        let mut order = sample_order();
        order.order_status = OrderStatus::Cancelled;
        order.cancellation_reason = Some("Out of stock".into());
        let rendered = status_update(&order);
        assert_eq!(rendered.subject, format!("Order #{} Cancelled", order.id));
        assert!(rendered.html.contains("Reason: Out of stock"));
    }

    #[test]
    fn user_text_is_escaped() {
        let rendered = contact_admin("<script>", "a@b.c", "line one\nline <two>");
        assert!(!rendered.html.contains("<script>"));
        assert!(rendered.html.contains("line one<br>line &lt;two&gt;"));
    }

    #[test]
    fn order_summary_shows_discount_and_free_shipping() {
        let mut order = sample_order();
        order.totals.shipping_charges = 0.0;
        order.totals.total = 900.0;
        order.discount_code = "STUDENT10".into();
        let rendered = order_confirmation(&order);
        assert!(rendered.html.contains("Discount (STUDENT10): -PKR 100.00"));
        assert!(rendered.html.contains("Shipping: Free"));
        assert!(rendered.html.contains("Total: PKR 900.00"));
    }

    #[test]
    fn otp_subject_depends_on_kind() {
        assert_eq!(otp("123456", OtpKind::Initial, 2).subject, "Your OTP Code");
        let resend = otp("654321", OtpKind::Resend, 5);
        assert_eq!(resend.subject, "Your New OTP Code");
        assert!(resend.html.contains("654321"));
        assert!(resend.html.contains("expires in 5 minutes"));
    }

    #[test]
    fn bulk_inlines_every_image() {
        let images = vec![
            Attachment {
                name: "a.png".into(),
                content_type: "image/png".into(),
                content: vec![1, 2, 3],
            },
            Attachment {
                name: "b.jpg".into(),
                content_type: "image/jpeg".into(),
                content: vec![4, 5, 6],
            },
        ];
        let rendered = bulk("Eid Sale", "Up to 30% off", &images);
        assert_eq!(rendered.html.matches("<img ").count(), 2);
        assert!(rendered.html.contains("data:image/png;base64,AQID"));
    }
}
