//! Customer- and admin-facing texts and inline keyboards.
use crate::config::{parse_http_url, Store};
use crate::model::{ButtonAction, Product, ProductId};
use crate::orders::OrderNotification;
use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const NOT_FOUND: &str = "محصولی یافت نشد. لطفاً نام دقیق‌تری وارد کنید.";
pub const SEARCH_AGAIN: &str = "مشکلی پیش آمد. لطفاً دوباره محصول را جستجو کنید.";
pub const ASK_PHONE: &str = "لطفاً شماره تلفن خود را ارسال نمایید:";
pub const UNKNOWN_COMMAND: &str = "دستور نامعتبر است.";
pub const CANCELLED: &str = "سفارش در انتظار شما لغو شد.";
pub const NOTHING_TO_CANCEL: &str = "سفارشی در انتظار ثبت ندارید.";

/// `25000000` -> `25,000,000`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn price(value: i64, currency: &str) -> String {
    format!("{} {}", group_thousands(value), currency)
}

pub fn welcome(store: &Store) -> String {
    format!(
        "به {} خوش آمدید.\nدر خدمت شما هستیم.\n\nبرای جستجوی محصول کافیست نام آن را ارسال کنید.",
        store.name
    )
}

pub fn help(store: &Store) -> String {
    format!(
        "برای جستجو، نام محصول را ارسال کنید.\n\nپشتیبانی: {}\nپرداخت امن: {}\n\n/cancel لغو سفارش در انتظار",
        store.support_phone, store.payment_link
    )
}

pub fn support(store: &Store) -> String {
    format!("📞 تماس با پشتیبانی: {}", store.support_phone)
}

pub fn product_card(product: &Product, currency: &str) -> String {
    format!("{}\nقیمت: {}", product.title, price(product.price, currency))
}

pub fn purchase_menu(product: &Product, currency: &str) -> String {
    format!(
        "محصول انتخابی:\n{}\nقیمت: {}\n\nلطفاً یک گزینه انتخاب کنید:",
        product.title,
        price(product.price, currency)
    )
}

pub fn too_many_results(total: usize, shown: usize) -> String {
    format!(
        "{} محصول یافت شد و {} مورد نمایش داده شد. برای نتایج دقیق‌تر نام کامل‌تری وارد کنید.",
        total, shown
    )
}

pub fn order_received(notification: &OrderNotification) -> String {
    format!(
        "شماره تماس شما دریافت شد.\nکارشناسان ما در اسرع وقت با شما تماس خواهند گرفت.\n\nکد پیگیری: {}",
        notification.short_reference()
    )
}

pub fn admin_notification(notification: &OrderNotification, currency: &str) -> String {
    let customer = match &notification.customer.username {
        Some(username) => format!("{} (@{})", notification.customer.full_name, username),
        None => notification.customer.full_name.clone(),
    };
    format!(
        "📌 سفارش جدید دریافت شد:\n\nمشتری: {}\nشماره تماس: {}\nمحصول: {}\nقیمت: {}\n\nکد پیگیری: {}\nزمان: {}",
        customer,
        notification.phone,
        notification.title,
        price(notification.price, currency),
        notification.short_reference(),
        notification.placed_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

/// Remote image address for a product, if it has a usable one.
pub fn image_url(product: &Product) -> Option<Url> {
    product.image_url.as_deref().and_then(parse_http_url)
}

pub fn product_keyboard(product_id: ProductId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🛒 خرید",
            ButtonAction::Buy(product_id).to_string(),
        )],
        vec![InlineKeyboardButton::callback(
            "📞 تماس با پشتیبانی",
            ButtonAction::Support.to_string(),
        )],
    ])
}

pub fn purchase_keyboard(product_id: ProductId, payment_link: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(
            "پرداخت امن زرین‌پال",
            payment_link.clone(),
        )],
        vec![InlineKeyboardButton::callback(
            "ارسال شماره برای ثبت سفارش",
            ButtonAction::SendPhone(product_id).to_string(),
        )],
    ])
}
