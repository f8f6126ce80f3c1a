use actix_web::HttpRequest;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locale {
    En,
    Ru,
}

pub fn detect_locale(req: &HttpRequest) -> Locale {
    if let Some(lang) = req.query_string().split('&').find_map(|kv| {
        let mut it = kv.splitn(2, '=');
        let k = it.next()?;
        let v = it.next()?;
        if k == "lang" { Some(v) } else { None }
    }) {
        return match lang.to_ascii_lowercase().as_str() { "ru" | "ru-ru" => Locale::Ru, _ => Locale::En };
    }

    if let Some(h) = req.headers().get("Accept-Language").and_then(|v| v.to_str().ok()) {
        let hl = h.to_ascii_lowercase();
        if hl.starts_with("ru") { return Locale::Ru; }
    }

    Locale::En
}

pub fn user_not_found(locale: Locale) -> &'static str {
    match locale {
        Locale::Ru => "Пользователь не найден",
        Locale::En => "User not found",
    }
}

pub fn internal_error(locale: Locale) -> &'static str {
    match locale {
        Locale::Ru => "Внутренняя ошибка сервера",
        Locale::En => "Internal server error",
    }
}

pub fn registration_failed(locale: Locale) -> &'static str {
    match locale {
        Locale::Ru => "Не удалось зарегистрироваться, попробуйте ещё раз",
        Locale::En => "Registration failed, please retry",
    }
}
